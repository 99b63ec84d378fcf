use std::sync::Arc;

use anyhow::Result;

use crate::api::{AppState, init_tracing};
use crate::core::AppConfig;
use crate::core::db::async_db;
use crate::jobs::{PeriodicJob, PruneConversations, ReminderJob, ReminderSlot};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum JobId {
    PruneConversations,
    MorningReminders,
    EveningReminders,
}

pub async fn run(id: JobId, config: AppConfig) -> Result<()> {
    init_tracing();

    let db = async_db(&config.db_path).await?;
    let state = Arc::new(AppState::from_config(db, config));

    let job: Box<dyn PeriodicJob> = match id {
        JobId::PruneConversations => Box::new(PruneConversations),
        JobId::MorningReminders => Box::new(ReminderJob(ReminderSlot::Morning)),
        JobId::EveningReminders => Box::new(ReminderJob(ReminderSlot::Evening)),
    };

    println!("Running job: {:?}", id);
    let count = job.run_job(&state.job_context()).await?;
    println!("Job completed, processed {}", count);

    Ok(())
}
