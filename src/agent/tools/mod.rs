//! Operations the language model may invoke. Each tool answers with a
//! JSON value the model reads back; input problems are reported as a
//! `ToolFailure` inside that value rather than as an `Err`.
pub mod events;
pub mod reminders;
pub mod subscription;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use crate::core::Services;
use crate::openai::BoxedToolCall;

pub use events::{AddEventTool, DeleteEventTool, SearchEventsTool};
pub use reminders::UpdateReminderSettingsTool;
pub use subscription::{CheckSubscriptionTool, UpgradeSubscriptionTool};

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum ToolFailure {
    #[error("日時の形式が正しくありません: {value}")]
    InvalidDatetime { value: String },
    #[error("削除する予定を特定できませんでした")]
    TargetNotIdentified,
    #[error("時刻の形式が正しくありません: {value}")]
    InvalidTime { value: String },
    #[error("無効なプランです: {plan}")]
    InvalidPlan { plan: String },
    #[error("ユーザー情報が見つかりません")]
    UserNotFound,
    #[error("Unknown function: {name}")]
    UnknownFunction { name: String },
}

impl ToolFailure {
    pub fn to_value(&self) -> Value {
        let mut value = serde_json::to_value(self).unwrap_or_else(|_| json!({}));
        value["success"] = json!(false);
        value["message"] = json!(self.to_string());
        value
    }
}

/// Who a tool acts for and what it can reach.
#[derive(Clone)]
pub struct ToolContext {
    pub user_id: String,
    pub services: Services,
}

impl ToolContext {
    pub fn new(user_id: &str, services: &Services) -> Self {
        Self {
            user_id: user_id.to_string(),
            services: services.clone(),
        }
    }

    /// Accepts RFC 3339 or a local ISO 8601 date and time.
    pub fn parse_datetime(&self, value: &str) -> Option<DateTime<FixedOffset>> {
        let value = value.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
            return Some(dt);
        }
        ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
            .map(|naive| self.services.localize(naive))
    }

    /// A `YYYY-MM-DD` prefix, or today when the value is unusable.
    pub fn parse_date_or_today(&self, value: Option<&str>) -> NaiveDate {
        value
            .and_then(|v| v.get(..10))
            .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
            .unwrap_or_else(|| self.services.local_now().date())
    }
}

/// Every tool offered to the model for one user turn.
pub fn calendar_tools(ctx: &ToolContext) -> Vec<BoxedToolCall> {
    let tools: Vec<BoxedToolCall> = vec![
        Box::new(SearchEventsTool::new(ctx.clone())),
        Box::new(AddEventTool::new(ctx.clone())),
        Box::new(DeleteEventTool::new(ctx.clone())),
        Box::new(UpdateReminderSettingsTool::new(ctx.clone())),
        Box::new(CheckSubscriptionTool::new(ctx.clone())),
        Box::new(UpgradeSubscriptionTool::new(ctx.clone())),
    ];
    tools
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::services::tests::{linked_user, test_services};

    pub(crate) async fn test_context() -> (ToolContext, std::sync::Arc<crate::calendar::MemoryCalendar>) {
        let (services, calendar) = test_services().await;
        services.users.upsert(&linked_user("U1")).await.unwrap();
        (ToolContext::new("U1", &services), calendar)
    }

    #[test]
    fn test_failure_value() {
        let value = ToolFailure::InvalidDatetime {
            value: String::from("tomorrow-ish"),
        }
        .to_value();
        assert_eq!(value["error"], "invalid_datetime");
        assert_eq!(value["success"], false);
        assert!(value["message"].as_str().unwrap().contains("tomorrow-ish"));

        assert_eq!(
            ToolFailure::TargetNotIdentified.to_value()["error"],
            "target_not_identified"
        );
    }

    #[tokio::test]
    async fn test_parse_datetime() {
        let (ctx, _) = test_context().await;
        assert_eq!(
            ctx.parse_datetime("2025-01-30T15:00:00").unwrap().to_rfc3339(),
            "2025-01-30T15:00:00+09:00"
        );
        assert_eq!(
            ctx.parse_datetime("2025-01-30T06:00:00Z").unwrap().to_rfc3339(),
            "2025-01-30T06:00:00+00:00"
        );
        assert!(ctx.parse_datetime("明日の3時").is_none());
    }

    #[tokio::test]
    async fn test_parse_date_or_today() {
        let (ctx, _) = test_context().await;
        assert_eq!(
            ctx.parse_date_or_today(Some("2025-02-03")),
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
        );
        assert_eq!(
            ctx.parse_date_or_today(Some("2025-02-03T10:00:00")),
            NaiveDate::from_ymd_opt(2025, 2, 3).unwrap()
        );
        assert_eq!(
            ctx.parse_date_or_today(Some("来週")),
            NaiveDate::from_ymd_opt(2025, 1, 29).unwrap()
        );
    }

    #[tokio::test]
    async fn test_tool_names_are_unique() {
        let (ctx, _) = test_context().await;
        let mut names: Vec<String> = calendar_tools(&ctx).iter().map(|t| t.function_name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 6);
    }
}
