use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate};
use uuid::Uuid;

use super::{
    CalendarEvent, CalendarResult, CalendarStore, EventSelector, MSG_DELETED, MSG_NOT_FOUND,
    MSG_UPDATE_FAILED, NewEvent, added_message, select_event,
};

#[derive(Debug, Clone)]
struct StoredEvent {
    id: String,
    title: String,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    location: Option<String>,
}

impl From<&StoredEvent> for CalendarEvent {
    fn from(e: &StoredEvent) -> Self {
        CalendarEvent {
            id: Some(e.id.clone()),
            title: e.title.clone(),
            date: Some(e.start.date_naive()),
            start_time: Some(e.start.format("%H:%M").to_string()),
            end_time: Some(e.end.format("%H:%M").to_string()),
            location: e.location.clone(),
        }
    }
}

/// A process local calendar. Used by the offline chat REPL and tests.
#[derive(Default)]
pub struct MemoryCalendar {
    events: Mutex<HashMap<String, Vec<StoredEvent>>>,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarStore for MemoryCalendar {
    async fn add(&self, user_id: &str, event: &NewEvent) -> CalendarResult {
        let Ok(mut events) = self.events.lock() else {
            return CalendarResult::failed(MSG_UPDATE_FAILED);
        };
        let id = Uuid::new_v4().simple().to_string();
        let user_events = events.entry(user_id.to_string()).or_default();
        user_events.push(StoredEvent {
            id: id.clone(),
            title: event.title.clone(),
            start: event.start,
            end: event.end(),
            location: event.location.clone(),
        });
        user_events.sort_by_key(|e| e.start);

        CalendarResult::ok(&added_message(&event.title), Some(id))
    }

    async fn list(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<CalendarEvent> {
        let Ok(events) = self.events.lock() else {
            return Vec::new();
        };
        events
            .get(user_id)
            .map(|user_events| {
                user_events
                    .iter()
                    .filter(|e| {
                        let day = e.start.date_naive();
                        day >= start && day <= end
                    })
                    .map(CalendarEvent::from)
                    .collect()
            })
            .unwrap_or_default()
    }

    async fn delete(&self, user_id: &str, selector: &EventSelector) -> CalendarResult {
        let target = match selector {
            EventSelector::Id(id) => Some(id.clone()),
            EventSelector::TitleOnDate { date, .. } | EventSelector::FirstOnDate { date, .. } => {
                let listing = self.list(user_id, *date, *date).await;
                select_event(&listing, selector).and_then(|e| e.id.clone())
            }
        };
        let Some(target) = target else {
            return CalendarResult::failed(MSG_NOT_FOUND);
        };

        let Ok(mut events) = self.events.lock() else {
            return CalendarResult::failed(MSG_UPDATE_FAILED);
        };
        let Some(user_events) = events.get_mut(user_id) else {
            return CalendarResult::failed(MSG_NOT_FOUND);
        };
        let before = user_events.len();
        user_events.retain(|e| e.id != target);
        if user_events.len() == before {
            return CalendarResult::failed(MSG_NOT_FOUND);
        }
        CalendarResult::ok(MSG_DELETED, Some(target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).unwrap()
    }

    fn new_event(title: &str, day: u32, hour: u32) -> NewEvent {
        NewEvent {
            title: title.to_string(),
            start: jst().with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap(),
            duration_minutes: 60,
            location: None,
        }
    }

    #[tokio::test]
    async fn test_add_and_list_in_order() {
        let cal = MemoryCalendar::new();
        cal.add("U1", &new_event("午後の会議", 30, 15)).await;
        let result = cal.add("U1", &new_event("朝会", 30, 9)).await;
        assert!(result.success);
        assert_eq!(result.message, "予定「朝会」を追加しました。");
        cal.add("U1", &new_event("別の日", 31, 9)).await;
        cal.add("U2", &new_event("他人の予定", 30, 9)).await;

        let day = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();
        let events = cal.list("U1", day, day).await;
        let titles: Vec<&str> = events.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["朝会", "午後の会議"]);
        assert_eq!(events[0].start_time.as_deref(), Some("09:00"));
        assert_eq!(events[0].end_time.as_deref(), Some("10:00"));
    }

    #[tokio::test]
    async fn test_delete_by_selector() {
        let cal = MemoryCalendar::new();
        let id = cal.add("U1", &new_event("歯医者", 30, 10)).await.event_id.unwrap();
        cal.add("U1", &new_event("会議", 30, 15)).await;
        let day = NaiveDate::from_ymd_opt(2025, 1, 30).unwrap();

        let missing = cal
            .delete(
                "U1",
                &EventSelector::TitleOnDate {
                    title: String::from("飲み会"),
                    date: day,
                },
            )
            .await;
        assert!(!missing.success);
        assert_eq!(missing.message, MSG_NOT_FOUND);

        let deleted = cal.delete("U1", &EventSelector::Id(id)).await;
        assert!(deleted.success);
        assert_eq!(cal.list("U1", day, day).await.len(), 1);
    }
}
