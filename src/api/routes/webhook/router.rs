//! Router for the webhook API

use axum::{Json, Router, extract::State};

use super::public::{LineWebhook, WebhookResponse};
use crate::api::state::SharedState;

/// Acknowledge a LINE delivery immediately. Each text message is
/// handled in its own task.
async fn line_webhook(
    State(state): State<SharedState>,
    Json(payload): Json<LineWebhook>,
) -> Json<WebhookResponse> {
    for event in &payload.events {
        let Some(message) = event.text_message() else {
            tracing::info!("Unhandled event type: {}", event.kind);
            continue;
        };
        let dispatcher = state.dispatcher.clone();
        tokio::spawn(async move {
            dispatcher
                .handle_message(&message.user_id, &message.text, &message.reply_token)
                .await;
        });
    }

    Json(WebhookResponse {
        status: String::from("ok"),
    })
}

/// Create the webhook router
pub fn router() -> Router<SharedState> {
    Router::new().route("/line", axum::routing::post(line_webhook))
}
