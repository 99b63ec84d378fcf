//! API routes module

pub mod health;
pub mod tasks;
pub mod webhook;

use axum::Router;

use crate::api::state::SharedState;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        .nest("/health", health::router())
        .nest("/tasks", tasks::router())
        .nest("/webhook", webhook::router())
}
