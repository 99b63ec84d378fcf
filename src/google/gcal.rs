//! Google Calendar v3 REST client
use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;

use super::oauth::refresh_access_token;
use crate::calendar::{
    ALL_DAY, CalendarEvent, CalendarResult, CalendarStore, EventSelector, MSG_AUTH_FAILED,
    MSG_DELETED, MSG_NOT_FOUND, MSG_UPDATE_FAILED, NewEvent, UNTITLED, added_message,
    select_event,
};
use crate::users::UserStore;

#[derive(Debug, Deserialize)]
pub struct EventTime {
    #[serde(rename = "dateTime")]
    pub date_time: Option<DateTime<FixedOffset>>,
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct Event {
    pub id: String,
    pub summary: Option<String>,
    pub location: Option<String>,
    pub start: EventTime,
    pub end: EventTime,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

#[derive(Debug, Deserialize)]
struct CreatedEvent {
    id: String,
}

/// Errors that map to a specific user facing message.
#[derive(Debug, thiserror::Error)]
enum GcalError {
    #[error("no Google credentials for user {0}")]
    NotAuthorized(String),
    #[error("Google Calendar request failed: {0} ({1})")]
    Api(StatusCode, String),
}

fn failure_message(err: &Error) -> &'static str {
    match err.downcast_ref::<GcalError>() {
        Some(GcalError::NotAuthorized(_)) => MSG_AUTH_FAILED,
        _ => MSG_UPDATE_FAILED,
    }
}

fn format_time(t: &EventTime, tz: FixedOffset) -> String {
    match t.date_time {
        Some(dt) => dt.with_timezone(&tz).format("%H:%M").to_string(),
        None => ALL_DAY.to_string(),
    }
}

impl Event {
    pub fn to_calendar_event(&self, tz: FixedOffset) -> CalendarEvent {
        let date = self
            .start
            .date_time
            .map(|dt| dt.with_timezone(&tz).date_naive())
            .or(self.start.date);
        CalendarEvent {
            id: Some(self.id.clone()),
            title: self.summary.clone().unwrap_or_else(|| UNTITLED.to_string()),
            date,
            start_time: Some(format_time(&self.start, tz)),
            end_time: Some(format_time(&self.end, tz)),
            location: self.location.clone(),
        }
    }
}

/// Talks to the primary calendar of each user using their stored
/// refresh token.
pub struct GoogleCalendar {
    users: Arc<dyn UserStore>,
    client_id: String,
    client_secret: String,
    oauth_hostname: String,
    api_hostname: String,
    tz: FixedOffset,
    client: Client,
}

impl GoogleCalendar {
    pub fn new(
        users: Arc<dyn UserStore>,
        client_id: &str,
        client_secret: &str,
        oauth_hostname: &str,
        api_hostname: &str,
        tz: FixedOffset,
    ) -> Self {
        Self {
            users,
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            oauth_hostname: oauth_hostname.to_string(),
            api_hostname: api_hostname.trim_end_matches('/').to_string(),
            tz,
            client: Client::new(),
        }
    }

    fn events_url(&self) -> String {
        format!("{}/calendar/v3/calendars/primary/events", self.api_hostname)
    }

    fn event_url(&self, event_id: &str) -> Result<Url, Error> {
        let mut url = Url::parse(&self.events_url())?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Invalid calendar API url: {}", self.api_hostname))?
            .push(event_id);
        Ok(url)
    }

    async fn access_token(&self, user_id: &str) -> Result<String, Error> {
        let refresh_token = self
            .users
            .get(user_id)
            .await?
            .and_then(|u| u.google_refresh_token)
            .ok_or_else(|| GcalError::NotAuthorized(user_id.to_string()))?;
        let token = refresh_access_token(
            &self.oauth_hostname,
            &self.client_id,
            &self.client_secret,
            &refresh_token,
        )
        .await?;
        Ok(token.access_token)
    }

    async fn insert_event(&self, user_id: &str, event: &NewEvent) -> Result<String, Error> {
        let access_token = self.access_token(user_id).await?;
        let mut body = json!({
            "summary": event.title,
            "start": {"dateTime": event.start.to_rfc3339()},
            "end": {"dateTime": event.end().to_rfc3339()},
        });
        if let Some(location) = &event.location {
            body["location"] = json!(location);
        }

        let res = self
            .client
            .post(self.events_url())
            .bearer_auth(access_token)
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GcalError::Api(status, text).into());
        }
        let created: CreatedEvent = serde_json::from_str(&text)?;
        Ok(created.id)
    }

    pub async fn list_events(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Event>, Error> {
        let access_token = self.access_token(user_id).await?;
        let time_min = start
            .and_time(NaiveTime::MIN)
            .and_local_timezone(self.tz)
            .single()
            .ok_or_else(|| anyhow!("Invalid start date {}", start))?;
        let time_max = end
            .succ_opt()
            .unwrap_or(end)
            .and_time(NaiveTime::MIN)
            .and_local_timezone(self.tz)
            .single()
            .ok_or_else(|| anyhow!("Invalid end date {}", end))?;

        let res = self
            .client
            .get(self.events_url())
            .bearer_auth(access_token)
            .query(&[
                ("timeMin", time_min.to_rfc3339()),
                ("timeMax", time_max.to_rfc3339()),
                ("singleEvents", String::from("true")),
                ("orderBy", String::from("startTime")),
            ])
            .send()
            .await?;
        let status = res.status();
        let text = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(GcalError::Api(status, text).into());
        }
        let list: EventList = serde_json::from_str(&text)?;
        Ok(list.items)
    }

    async fn delete_event(&self, user_id: &str, selector: &EventSelector) -> Result<CalendarResult, Error> {
        let event_id = match selector {
            EventSelector::Id(id) => id.clone(),
            EventSelector::TitleOnDate { date, .. } | EventSelector::FirstOnDate { date, .. } => {
                let events: Vec<CalendarEvent> = self
                    .list_events(user_id, *date, *date)
                    .await?
                    .iter()
                    .map(|e| e.to_calendar_event(self.tz))
                    .collect();
                match select_event(&events, selector).and_then(|e| e.id.clone()) {
                    Some(id) => id,
                    None => return Ok(CalendarResult::failed(MSG_NOT_FOUND)),
                }
            }
        };

        let access_token = self.access_token(user_id).await?;
        let res = self
            .client
            .delete(self.event_url(&event_id)?)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
            return Ok(CalendarResult::failed(MSG_NOT_FOUND));
        }
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(GcalError::Api(status, text).into());
        }
        Ok(CalendarResult::ok(MSG_DELETED, Some(event_id)))
    }
}

#[async_trait]
impl CalendarStore for GoogleCalendar {
    async fn add(&self, user_id: &str, event: &NewEvent) -> CalendarResult {
        match self.insert_event(user_id, event).await {
            Ok(id) => {
                tracing::info!("Created event {} for user {}", id, user_id);
                CalendarResult::ok(&added_message(&event.title), Some(id))
            }
            Err(e) => {
                tracing::error!("Error adding event for user {}: {}", user_id, e);
                CalendarResult::failed(failure_message(&e))
            }
        }
    }

    async fn list(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Vec<CalendarEvent> {
        match self.list_events(user_id, start, end).await {
            Ok(events) => events.iter().map(|e| e.to_calendar_event(self.tz)).collect(),
            Err(e) => {
                tracing::error!("Error listing events for user {}: {}", user_id, e);
                Vec::new()
            }
        }
    }

    async fn delete(&self, user_id: &str, selector: &EventSelector) -> CalendarResult {
        match self.delete_event(user_id, selector).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("Error deleting event for user {}: {}", user_id, e);
                CalendarResult::failed(failure_message(&e))
            }
        }
    }
}
