//! Deterministic replies driven by intent classification and entity
//! extraction. Always available, with or without a language model.
pub mod render;

use anyhow::{Error, Result};

use crate::calendar::{EventSelector, MSG_UPDATE_UNSUPPORTED, NewEvent};
use crate::core::Services;
use crate::nlp::{self, EntityBag, Intent, entities::default_title};
use crate::subscription::{Plan, UpgradeError};

pub use render::{
    format_events_list, render_plan_catalog, render_subscription_info, HELP_MESSAGE,
};

const DEFAULT_DURATION_MINUTES: u32 = 60;

pub const MSG_MISSING_DATETIME: &str =
    "日時が分かりませんでした。\n「明日の15時に会議」のように日時を含めて入力してください。";
pub const MSG_NO_SUBSCRIPTION_INFO: &str = "プラン情報を取得できませんでした。";
pub const MSG_PATTERN_ERROR: &str = "エラーが発生しました。";

#[derive(Clone)]
pub struct PatternRouter {
    services: Services,
}

impl PatternRouter {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Reply to `text` without a language model. Never fails.
    pub async fn respond(&self, user_id: &str, text: &str) -> String {
        match self.route(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Error in pattern matching for user {}: {}", user_id, e);
                MSG_PATTERN_ERROR.to_string()
            }
        }
    }

    async fn route(&self, user_id: &str, text: &str) -> Result<String, Error> {
        let now = self.services.local_now();
        let (intent, entities) = nlp::process_message(text, now);

        match intent {
            Intent::AddEvent => Ok(self.add_event(user_id, text, &entities).await),
            Intent::ListEvents => {
                let (start, end) = entities.require_range()?;
                let events = self.services.calendar.list(user_id, start, end).await;
                Ok(format_events_list(&events))
            }
            Intent::DeleteEvent => {
                let selector = delete_selector(&entities)?;
                Ok(self.services.calendar.delete(user_id, &selector).await.message)
            }
            Intent::UpdateEvent => Ok(MSG_UPDATE_UNSUPPORTED.to_string()),
            Intent::CheckSubscription => {
                let info = self.services.gate.subscription_info(user_id).await?;
                Ok(info
                    .map(|i| render_subscription_info(&i))
                    .unwrap_or_else(|| MSG_NO_SUBSCRIPTION_INFO.to_string()))
            }
            Intent::UpgradePlan => self.upgrade(user_id, text).await,
            Intent::Unknown => Ok(HELP_MESSAGE.to_string()),
        }
    }

    async fn add_event(&self, user_id: &str, text: &str, entities: &EntityBag) -> String {
        let now = self.services.local_now();
        let start = match entities.require_start(now.date()) {
            Ok(start) => start,
            Err(e) => {
                tracing::info!("Not adding event for user {}: {}", user_id, e);
                return MSG_MISSING_DATETIME.to_string();
            }
        };
        let event = NewEvent {
            title: entities
                .title
                .clone()
                .unwrap_or_else(|| default_title(text)),
            start: self.services.localize(start),
            duration_minutes: entities.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES),
            location: entities.location.clone(),
        };
        self.services.calendar.add(user_id, &event).await.message
    }

    async fn upgrade(&self, user_id: &str, text: &str) -> Result<String, Error> {
        let Some(plan) = Plan::find_in_text(text) else {
            return Ok(render_plan_catalog());
        };
        match self.services.gate.upgrade(user_id, plan.as_str()).await {
            Ok(outcome) => Ok(outcome.message()),
            Err(UpgradeError::Store(e)) => Err(e),
            Err(e) => Ok(e.to_string()),
        }
    }
}

fn delete_selector(entities: &EntityBag) -> Result<EventSelector, Error> {
    if let Some(id) = &entities.event_id {
        return Ok(EventSelector::Id(id.clone()));
    }
    let (date, _) = entities.require_range()?;
    Ok(EventSelector::FirstOnDate {
        date,
        keyword: entities.keyword.clone(),
    })
}
