use anyhow::{Error, Result};
use serde_json::{Value, json};

use super::{ConversationStore, TurnRole};
use crate::agent::{AgentReply, CalendarAgent};

const CONTEXT_TURNS: usize = 10;
const CONTEXT_HOURS: i64 = 2;

/// Runs the AI path with the user's recent history and records every
/// turn it produces.
pub struct ConversationService {
    store: ConversationStore,
    agent: CalendarAgent,
}

impl ConversationService {
    pub fn new(store: ConversationStore, agent: CalendarAgent) -> Self {
        Self { store, agent }
    }

    pub async fn process_message_with_ai(&self, user_id: &str, text: &str) -> AgentReply {
        match self.run(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Failed to record conversation for {}: {}", user_id, e);
                AgentReply::apology()
            }
        }
    }

    async fn run(&self, user_id: &str, text: &str) -> Result<AgentReply, Error> {
        // Read context first so the current message isn't sent twice
        let history = self.store.recent(user_id, CONTEXT_TURNS, CONTEXT_HOURS).await?;
        let last_event = self.store.last_referenced_entity(user_id).await?;

        self.store
            .append(&self.store.turn(user_id, TurnRole::User, text))
            .await?;

        let reply = self
            .agent
            .process_message(user_id, text, &history, last_event.as_ref())
            .await;

        let mut assistant = self.store.turn(user_id, TurnRole::Assistant, &reply.text);
        if !reply.tool_results.is_empty() {
            assistant = assistant.with_metadata(json!({"function_results": reply.tool_results}));
        }
        self.store.append(&assistant).await?;

        for event in reply.tool_results.iter().filter_map(|r| r.get("event")) {
            self.save_event_context(user_id, event).await;
        }

        Ok(reply)
    }

    async fn save_event_context(&self, user_id: &str, event: &Value) {
        let title = event
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or("不明");
        let turn = self
            .store
            .turn(user_id, TurnRole::System, &format!("参照した予定: {}", title))
            .with_metadata(json!({"event": event}));
        if let Err(e) = self.store.append(&turn).await {
            tracing::error!("Failed to save event context for {}: {}", user_id, e);
        }
    }
}
