use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use tokio_rusqlite::Connection;

use super::{AppConfig, Clock, SystemClock};
use crate::calendar::CalendarStore;
use crate::conversation::ConversationStore;
use crate::google::GoogleCalendar;
use crate::subscription::SubscriptionGate;
use crate::users::{SqliteUserStore, UserStore};

/// Handles to every collaborator a message may touch. Cheap to clone.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub calendar: Arc<dyn CalendarStore>,
    pub conversations: ConversationStore,
    pub gate: SubscriptionGate,
    pub clock: Arc<dyn Clock>,
    pub tz: FixedOffset,
}

impl Services {
    pub fn new(
        db: Connection,
        users: Arc<dyn UserStore>,
        calendar: Arc<dyn CalendarStore>,
        clock: Arc<dyn Clock>,
        tz: FixedOffset,
    ) -> Self {
        Self {
            conversations: ConversationStore::new(db, clock.clone()),
            gate: SubscriptionGate::new(users.clone(), clock.clone()),
            users,
            calendar,
            clock,
            tz,
        }
    }

    /// Wire up the production collaborators.
    pub fn from_config(config: &AppConfig, db: Connection) -> Self {
        let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db.clone()));
        let calendar = Arc::new(GoogleCalendar::new(
            users.clone(),
            &config.google_client_id,
            &config.google_client_secret,
            &config.google_oauth_hostname,
            &config.google_calendar_hostname,
            config.timezone(),
        ));
        Self::new(db, users, calendar, Arc::new(SystemClock), config.timezone())
    }

    pub fn local_now(&self) -> NaiveDateTime {
        self.clock.local_now(self.tz)
    }

    /// Interpret a local wall-clock time in the configured offset.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<FixedOffset> {
        naive
            .and_local_timezone(self.tz)
            .single()
            .unwrap_or_else(|| naive.and_utc().fixed_offset())
    }
}
