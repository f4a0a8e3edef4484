use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("domain entity `{entity}` with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("concurrent update conflict on `{entity}` with id {id}")]
    Conflict { entity: &'static str, id: i64 },
    #[error("domain validation failed: {message}")]
    Validation { message: String },
}

impl DomainError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn conflict(entity: &'static str, id: i64) -> Self {
        Self::Conflict { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}
