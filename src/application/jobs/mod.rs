mod resync;

pub use resync::{ResyncJob, ResyncJobContext, process_resync_job, resync_schedule};
