//! The calendar collaborator. Operations never fail past this
//! boundary: problems come back as an unsuccessful `CalendarResult`
//! or an empty listing.
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

pub use memory::MemoryCalendar;

pub const UNTITLED: &str = "(タイトルなし)";
pub const ALL_DAY: &str = "終日";

pub const MSG_AUTH_FAILED: &str = "認証エラーが発生しました。";
pub const MSG_UPDATE_FAILED: &str = "カレンダーの更新に失敗しました。";
pub const MSG_NOT_FOUND: &str = "削除する予定が見つかりませんでした。";
pub const MSG_DELETED: &str = "予定を削除しました。";
pub const MSG_UPDATE_UNSUPPORTED: &str = "予定の更新機能は開発中です。";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: Option<String>,
    pub title: String,
    pub date: Option<NaiveDate>,
    /// `HH:MM`, or `終日` for all-day events
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
}

impl CalendarResult {
    pub fn ok(message: &str, event_id: Option<String>) -> Self {
        Self {
            success: true,
            message: message.to_string(),
            event_id,
        }
    }

    pub fn failed(message: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            event_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub start: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub location: Option<String>,
}

impl NewEvent {
    pub fn end(&self) -> DateTime<FixedOffset> {
        self.start + chrono::Duration::minutes(i64::from(self.duration_minutes))
    }
}

/// Which event a delete applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelector {
    Id(String),
    /// First event on `date` whose title contains `title`
    TitleOnDate { title: String, date: NaiveDate },
    /// First event on `date`, optionally narrowed by a keyword
    FirstOnDate { date: NaiveDate, keyword: Option<String> },
}

pub fn added_message(title: &str) -> String {
    format!("予定「{}」を追加しました。", title)
}

#[async_trait]
pub trait CalendarStore: Send + Sync {
    async fn add(&self, user_id: &str, event: &NewEvent) -> CalendarResult;

    /// Events starting between `start` and `end` inclusive, ordered by
    /// start time.
    async fn list(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<CalendarEvent>;

    async fn delete(&self, user_id: &str, selector: &EventSelector) -> CalendarResult;
}

/// Pick the event a date based selector refers to from a listing.
pub fn select_event<'a>(
    events: &'a [CalendarEvent],
    selector: &EventSelector,
) -> Option<&'a CalendarEvent> {
    match selector {
        EventSelector::Id(id) => events.iter().find(|e| e.id.as_deref() == Some(id)),
        EventSelector::TitleOnDate { title, .. } => {
            events.iter().find(|e| e.title.contains(title.as_str()))
        }
        EventSelector::FirstOnDate { keyword, .. } => match keyword {
            Some(k) => events.iter().find(|e| e.title.contains(k.as_str())),
            None => events.first(),
        },
    }
}
