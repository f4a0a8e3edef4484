pub mod comments;
pub mod error;
pub mod hot;
pub mod jobs;
pub mod repos;
