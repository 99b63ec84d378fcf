use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::subscription::Plan;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub reminder_enabled: bool,
    pub reminder_time_morning: String,
    pub reminder_time_evening: String,
    pub reminder_days_ahead: u32,
    pub reminder_before_event_minutes: u32,
    // Explicit opt-in, separate from what the plan allows
    pub use_ai_agent: bool,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            reminder_enabled: true,
            reminder_time_morning: String::from("09:00"),
            reminder_time_evening: String::from("21:00"),
            reminder_days_ahead: 1,
            reminder_before_event_minutes: 0,
            use_ai_agent: false,
        }
    }
}

/// A partial update to `UserPreferences`. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreferencesUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_time_morning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_time_evening: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_days_ahead: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder_before_event_minutes: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_ai_agent: Option<bool>,
}

impl UserPreferences {
    pub fn apply(&mut self, update: &PreferencesUpdate) {
        if let Some(v) = update.reminder_enabled {
            self.reminder_enabled = v;
        }
        if let Some(v) = &update.reminder_time_morning {
            self.reminder_time_morning = v.clone();
        }
        if let Some(v) = &update.reminder_time_evening {
            self.reminder_time_evening = v.clone();
        }
        if let Some(v) = update.reminder_days_ahead {
            self.reminder_days_ahead = v;
        }
        if let Some(v) = update.reminder_before_event_minutes {
            self.reminder_before_event_minutes = v;
        }
        if let Some(v) = update.use_ai_agent {
            self.use_ai_agent = v;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionState {
    pub plan: Plan,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub ai_calls_used: u32,
    /// `None` is unlimited
    pub ai_calls_limit: Option<u32>,
    pub last_reset_at: Option<DateTime<Utc>>,
}

impl Default for SubscriptionState {
    fn default() -> Self {
        Self {
            plan: Plan::Free,
            is_active: true,
            expires_at: None,
            ai_calls_used: 0,
            ai_calls_limit: Plan::Free.config().ai_calls_limit,
            last_reset_at: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub google_email: Option<String>,
    #[serde(skip_serializing)]
    pub google_refresh_token: Option<String>,
    pub preferences: UserPreferences,
    pub subscription: SubscriptionState,
    pub is_active: bool,
}

impl User {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            google_email: None,
            google_refresh_token: None,
            preferences: UserPreferences::default(),
            subscription: SubscriptionState::default(),
            is_active: true,
        }
    }

    /// A user can only use the bot once a calendar account is linked.
    pub fn is_linked(&self) -> bool {
        self.google_email.is_some()
    }
}
