//! Cron job that periodically rebuilds the hot ranking from the database.

use std::str::FromStr;
use std::sync::Arc;

use apalis::prelude::*;
use cron::Schedule;

use crate::cache::HotResync;

/// Marker struct for the cron-triggered resync job.
/// Must implement `From<chrono::DateTime<chrono::Utc>>` for apalis-cron compatibility.
#[derive(Default, Debug, Clone)]
pub struct ResyncJob;

impl From<chrono::DateTime<chrono::Utc>> for ResyncJob {
    fn from(_: chrono::DateTime<chrono::Utc>) -> Self {
        Self
    }
}

/// Context for the resync job worker.
#[derive(Clone)]
pub struct ResyncJobContext {
    pub resync: Arc<HotResync>,
}

/// Process one scheduled resync. A failed cycle is logged and left to the
/// next tick; the previously-live ranking keeps serving in the meantime.
pub async fn process_resync_job(
    _job: ResyncJob,
    ctx: Data<ResyncJobContext>,
) -> Result<(), apalis::prelude::Error> {
    match ctx.resync.run().await {
        Ok(outcome) if outcome.synced > 0 => {
            tracing::info!(synced = outcome.synced, "Scheduled resync completed");
        }
        Ok(_) => {
            tracing::debug!("Scheduled resync found nothing to sync");
        }
        Err(err) => {
            tracing::warn!(error = %err, "Scheduled resync failed; previous ranking stays live");
        }
    }
    Ok(())
}

/// Parse the configured cron expression for the resync cadence.
pub fn resync_schedule(expression: &str) -> Result<Schedule, cron::error::Error> {
    Schedule::from_str(expression)
}
