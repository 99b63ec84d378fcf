//! LINE Messaging API client
use anyhow::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use super::Transport;

// LINE rejects text messages longer than this
const MAX_TEXT_CHARS: usize = 5000;

#[derive(Debug, Serialize)]
struct TextMessage {
    r#type: &'static str,
    text: String,
}

impl TextMessage {
    fn new(text: &str) -> Self {
        Self {
            r#type: "text",
            text: text.chars().take(MAX_TEXT_CHARS).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest {
    reply_token: String,
    messages: Vec<TextMessage>,
}

#[derive(Debug, Serialize)]
struct PushRequest {
    to: String,
    messages: Vec<TextMessage>,
}

#[derive(Clone)]
pub struct LineMessaging {
    api_hostname: String,
    access_token: String,
    client: Client,
}

impl LineMessaging {
    pub fn new(api_hostname: &str, access_token: &str) -> Self {
        Self {
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            access_token: access_token.to_string(),
            client: Client::new(),
        }
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<(), Error> {
        let res = self
            .client
            .post(format!("{}{}", self.api_hostname, path))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            anyhow::bail!("LINE API request to {} failed: {} ({})", path, status, text);
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for LineMessaging {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), Error> {
        let body = ReplyRequest {
            reply_token: reply_token.to_string(),
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/reply", &body).await
    }

    async fn push(&self, user_id: &str, text: &str) -> Result<(), Error> {
        let body = PushRequest {
            to: user_id.to_string(),
            messages: vec![TextMessage::new(text)],
        };
        self.post("/v2/bot/message/push", &body).await
    }
}
