use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ToolContext, ToolFailure};
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use crate::users::PreferencesUpdate;

#[derive(Serialize)]
pub struct UpdateReminderSettingsProps {
    pub reminder_enabled: Property,
    pub morning_time: Property,
    pub evening_time: Property,
    pub days_ahead: Property,
    pub before_event_minutes: Property,
}

#[derive(Deserialize)]
pub struct UpdateReminderSettingsArgs {
    pub reminder_enabled: Option<bool>,
    pub morning_time: Option<String>,
    pub evening_time: Option<String>,
    pub days_ahead: Option<u32>,
    pub before_event_minutes: Option<u32>,
}

#[derive(Serialize)]
pub struct UpdateReminderSettingsTool {
    pub r#type: ToolType,
    pub function: Function<UpdateReminderSettingsProps>,
    #[serde(skip)]
    ctx: ToolContext,
}

/// Normalize `H:MM`/`HH:MM` to `HH:MM`.
fn reminder_time(value: &str) -> Result<String, ToolFailure> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map(|t| t.format("%H:%M").to_string())
        .map_err(|_| ToolFailure::InvalidTime {
            value: value.to_string(),
        })
}

impl UpdateReminderSettingsArgs {
    fn into_update(self) -> Result<PreferencesUpdate, ToolFailure> {
        Ok(PreferencesUpdate {
            reminder_enabled: self.reminder_enabled,
            reminder_time_morning: self.morning_time.as_deref().map(reminder_time).transpose()?,
            reminder_time_evening: self.evening_time.as_deref().map(reminder_time).transpose()?,
            reminder_days_ahead: self.days_ahead,
            reminder_before_event_minutes: self.before_event_minutes,
            use_ai_agent: None,
        })
    }
}

#[async_trait]
impl ToolCall for UpdateReminderSettingsTool {
    async fn call(&self, args: &str) -> Result<Value, Error> {
        let fn_args: UpdateReminderSettingsArgs = serde_json::from_str(args)?;
        let update = match fn_args.into_update() {
            Ok(update) => update,
            Err(failure) => return Ok(failure.to_value()),
        };

        let users = &self.ctx.services.users;
        let Some(user) = users.get(&self.ctx.user_id).await? else {
            return Ok(ToolFailure::UserNotFound.to_value());
        };
        let mut preferences = user.preferences;
        preferences.apply(&update);
        let success = users
            .update_preferences(&self.ctx.user_id, &preferences)
            .await?;

        let message = if success {
            "リマインダー設定を更新しました"
        } else {
            "設定の更新に失敗しました"
        };
        Ok(json!({
            "success": success,
            "updated_settings": update,
            "message": message,
        }))
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl UpdateReminderSettingsTool {
    pub fn new(ctx: ToolContext) -> Self {
        let function = Function {
            name: String::from("update_reminder_settings"),
            description: String::from("リマインダーの設定を更新します。変更する項目だけを指定します"),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: UpdateReminderSettingsProps {
                    reminder_enabled: Property::new("boolean", "リマインダーを有効にするか"),
                    morning_time: Property::new("string", "朝のリマインダー時刻 (HH:MM形式)"),
                    evening_time: Property::new("string", "夜のリマインダー時刻 (HH:MM形式)"),
                    days_ahead: Property::new("integer", "何日先までの予定を通知するか"),
                    before_event_minutes: Property::new("integer", "予定の何分前に通知するか"),
                },
                required: vec![],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ctx,
        }
    }
}
