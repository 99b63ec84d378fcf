use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }
}

impl std::str::FromStr for TurnRole {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "system" => Ok(TurnRole::System),
            other => Err(anyhow::anyhow!("Unknown conversation role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: String,
    pub user_id: String,
    pub role: TurnRole,
    pub content: String,
    pub tool_call: Option<Value>,
    pub metadata: Option<Value>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Ids sort by time for a given user. The nonce keeps two turns
    /// created in the same microsecond distinct.
    pub fn new(user_id: &str, role: TurnRole, content: &str, timestamp: DateTime<Utc>) -> Self {
        let nonce = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("{}_{}_{}", user_id, timestamp.timestamp_micros(), &nonce[..8]),
            user_id: user_id.to_string(),
            role,
            content: content.to_string(),
            tool_call: None,
            metadata: None,
            timestamp,
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_tool_call(mut self, tool_call: Value) -> Self {
        self.tool_call = Some(tool_call);
        self
    }

    /// The event this turn refers to, if any.
    pub fn referenced_event(&self) -> Option<&Value> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get("event"))
            .filter(|e| !e.is_null())
    }
}
