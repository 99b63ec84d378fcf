pub mod prune_conversations;
pub mod reminders;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;

pub use prune_conversations::PruneConversations;
pub use reminders::{ReminderJob, ReminderSlot, generate_reminders};

use crate::core::{AppConfig, Services};
use crate::messaging::Transport;

/// Everything a job needs to do its work.
#[derive(Clone)]
pub struct JobContext {
    pub config: AppConfig,
    pub services: Services,
    pub transport: Arc<dyn Transport>,
}

#[async_trait]
pub trait PeriodicJob: Send + Sync + std::fmt::Debug {
    fn interval(&self) -> Duration;

    /// Run once. Returns the number of items processed.
    async fn run_job(&self, ctx: &JobContext) -> Result<usize, Error>;
}

/// Run `job` on its interval for the life of the process. The first run
/// happens immediately.
pub fn spawn_periodic_job<J: PeriodicJob + 'static>(ctx: JobContext, job: J) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(job.interval());
        loop {
            interval.tick().await;
            tracing::info!("Running periodic job {:?}", job);
            match job.run_job(&ctx).await {
                Ok(count) => tracing::info!("Job {:?} processed {} items", job, count),
                Err(e) => tracing::error!("Job {:?} failed: {}", job, e),
            }
        }
    });
}
