//! Public types for the webhook API
use serde::{Deserialize, Serialize};

/// A LINE Messaging API webhook delivery. May carry several events.
#[derive(Debug, Deserialize, Serialize)]
pub struct LineWebhook {
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub events: Vec<LineEvent>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reply_token: Option<String>,
    #[serde(default)]
    pub source: Option<LineSource>,
    #[serde(default)]
    pub message: Option<LineMessage>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineSource {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct LineMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

/// The parts of a text message event needed to answer it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextMessage {
    pub user_id: String,
    pub text: String,
    pub reply_token: String,
}

impl LineEvent {
    /// `None` for anything other than a text message from a user.
    pub fn text_message(&self) -> Option<TextMessage> {
        if self.kind != "message" {
            return None;
        }
        let message = self.message.as_ref().filter(|m| m.kind == "text")?;
        Some(TextMessage {
            user_id: self.source.as_ref()?.user_id.clone()?,
            text: message.text.clone()?,
            reply_token: self.reply_token.clone()?,
        })
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct WebhookResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message_event() {
        let body = r#"{
            "destination": "Ubot",
            "events": [
                {
                    "type": "message",
                    "replyToken": "r1",
                    "source": {"type": "user", "userId": "U1"},
                    "message": {"type": "text", "id": "m1", "text": "今日の予定は？"}
                },
                {
                    "type": "message",
                    "replyToken": "r2",
                    "source": {"type": "user", "userId": "U1"},
                    "message": {"type": "sticker", "id": "m2"}
                },
                {"type": "follow", "replyToken": "r3", "source": {"type": "user", "userId": "U2"}}
            ]
        }"#;
        let webhook: LineWebhook = serde_json::from_str(body).unwrap();
        let texts: Vec<TextMessage> = webhook.events.iter().filter_map(LineEvent::text_message).collect();
        assert_eq!(
            texts,
            vec![TextMessage {
                user_id: String::from("U1"),
                text: String::from("今日の予定は？"),
                reply_token: String::from("r1"),
            }]
        );
    }
}
