//! Router for scheduled maintenance triggers

use axum::{Json, Router, extract::State, routing::post};

use super::public::{GenerateRemindersRequest, TaskResponse};
use crate::api::public::ApiError;
use crate::api::state::SharedState;
use crate::jobs::{PeriodicJob, PruneConversations, generate_reminders};

async fn prune_conversations(
    State(state): State<SharedState>,
) -> Result<Json<TaskResponse>, ApiError> {
    let count = PruneConversations.run_job(&state.job_context()).await?;
    Ok(Json(TaskResponse {
        status: String::from("pruned"),
        count,
    }))
}

async fn generate_reminders_handler(
    State(state): State<SharedState>,
    Json(payload): Json<GenerateRemindersRequest>,
) -> Result<Json<TaskResponse>, ApiError> {
    let count = generate_reminders(&state.services, &state.transport, payload.time_slot).await?;
    Ok(Json(TaskResponse {
        status: String::from("generated"),
        count,
    }))
}

/// Create the tasks router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/prune-conversations", post(prune_conversations))
        .route("/generate-reminders", post(generate_reminders_handler))
}
