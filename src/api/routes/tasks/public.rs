//! Public types for the maintenance task API
use serde::{Deserialize, Serialize};

use crate::jobs::ReminderSlot;

#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateRemindersRequest {
    #[serde(default = "default_slot")]
    pub time_slot: ReminderSlot,
}

fn default_slot() -> ReminderSlot {
    ReminderSlot::Morning
}

#[derive(Debug, Deserialize, Serialize)]
pub struct TaskResponse {
    pub status: String,
    pub count: usize,
}
