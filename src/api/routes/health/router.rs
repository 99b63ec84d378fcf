//! Router for the health API

use std::collections::BTreeMap;

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};

use super::public::{HealthResponse, ReadinessResponse};
use crate::api::state::SharedState;

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: String::from("healthy"),
    })
}

/// Ready once the database answers a trivial query.
async fn readiness(State(state): State<SharedState>) -> (StatusCode, Json<ReadinessResponse>) {
    let result = state
        .db
        .call(|conn| {
            let one: i64 = conn.query_row("SELECT 1", [], |row| row.get(0))?;
            Ok(one)
        })
        .await;

    match result {
        Ok(_) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: String::from("ready"),
                checks: BTreeMap::from([(String::from("database"), String::from("ok"))]),
                error: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: String::from("not ready"),
                    checks: BTreeMap::new(),
                    error: Some(e.to_string()),
                }),
            )
        }
    }
}

/// Create the health router
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(health))
        .route("/ready", get(readiness))
}
