//! Per-message routing between the AI path and the pattern path.
use std::sync::Arc;

use anyhow::{Error, Result};

use crate::agent::CalendarAgent;
use crate::conversation::ConversationService;
use crate::core::{AppConfig, Services};
use crate::messaging::Transport;
use crate::openai::{LanguageModel, OpenAiClient};
use crate::pattern::PatternRouter;
use crate::subscription::Eligibility;

pub const RETRY_LATER: &str = "エラーが発生しました。しばらくしてからもう一度お試しください。";
const PATTERN_FALLBACK_NOTICE: &str = "パターン認識モードで処理します。";

pub fn linking_message(url: &str) -> String {
    format!(
        "Googleカレンダーとの連携が必要です。\n以下のリンクから連携設定を行ってください：\n{}",
        url
    )
}

pub struct Dispatcher {
    services: Services,
    transport: Arc<dyn Transport>,
    pattern: PatternRouter,
    // Only set when the AI path is enabled and configured
    conversation: Option<ConversationService>,
    linking_url: String,
}

impl Dispatcher {
    /// A dispatcher that only uses the pattern path.
    pub fn new(services: Services, transport: Arc<dyn Transport>, linking_url: &str) -> Self {
        Self {
            pattern: PatternRouter::new(services.clone()),
            services,
            transport,
            conversation: None,
            linking_url: linking_url.to_string(),
        }
    }

    pub fn with_agent(mut self, model: Arc<dyn LanguageModel>) -> Self {
        let agent = CalendarAgent::new(model, self.services.clone());
        self.conversation = Some(ConversationService::new(
            self.services.conversations.clone(),
            agent,
        ));
        self
    }

    pub fn from_config(
        config: &AppConfig,
        services: Services,
        transport: Arc<dyn Transport>,
    ) -> Self {
        let dispatcher = Self::new(services, transport, &config.linking_url());
        match (&config.openai_api_key, config.use_ai_agent) {
            (Some(key), true) => {
                tracing::info!("AI agent enabled with model {}", config.openai_model);
                dispatcher.with_agent(Arc::new(OpenAiClient::new(
                    &config.openai_api_hostname,
                    key,
                    &config.openai_model,
                )))
            }
            _ => {
                tracing::info!("AI agent disabled, using pattern matching only");
                dispatcher
            }
        }
    }

    /// Handle one inbound text message and send the reply.
    pub async fn handle_message(&self, user_id: &str, text: &str, reply_token: &str) {
        tracing::info!("Message from {}: {}", user_id, text);
        let reply = self.respond(user_id, text).await;
        if let Err(e) = self.transport.reply(reply_token, &reply).await {
            tracing::error!("Failed to send reply to {}: {}", user_id, e);
        }
    }

    /// The reply for `text`. Never fails.
    pub async fn respond(&self, user_id: &str, text: &str) -> String {
        match self.route(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error handling message from {}: {}", user_id, e);
                RETRY_LATER.to_string()
            }
        }
    }

    async fn route(&self, user_id: &str, text: &str) -> Result<String, Error> {
        let user = self
            .services
            .users
            .get(user_id)
            .await?
            .filter(|u| u.is_linked());
        let Some(user) = user else {
            tracing::info!("User {} has not linked a calendar", user_id);
            return Ok(linking_message(&self.linking_url));
        };

        let eligibility = self.services.gate.check_eligibility(user_id).await?;
        let Some(conversation) = &self.conversation else {
            return Ok(self.pattern.respond(user_id, text).await);
        };

        match eligibility {
            Eligibility::Allowed => {
                tracing::info!("Routing message from {} to the AI agent", user_id);
                let reply = conversation.process_message_with_ai(user_id, text).await;
                if reply.succeeded {
                    self.services.gate.increment_usage(user_id).await?;
                }
                Ok(reply.text)
            }
            Eligibility::Denied(reason) => {
                tracing::info!("AI path denied for {}: {:?}", user_id, reason);
                let fallback = self.pattern.respond(user_id, text).await;
                if user.preferences.use_ai_agent {
                    Ok(format!("{}\n\n{}\n\n{}", reason, PATTERN_FALLBACK_NOTICE, fallback))
                } else {
                    Ok(fallback)
                }
            }
        }
    }
}
