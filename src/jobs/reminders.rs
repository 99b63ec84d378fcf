use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use chrono::Days;
use serde::{Deserialize, Serialize};

use super::{JobContext, PeriodicJob};
use crate::calendar::CalendarEvent;
use crate::core::Services;
use crate::messaging::Transport;
use crate::users::User;

const MAX_LISTED_EVENTS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderSlot {
    Morning,
    Evening,
}

impl ReminderSlot {
    fn preferred_time<'a>(&self, user: &'a User) -> &'a str {
        match self {
            ReminderSlot::Morning => &user.preferences.reminder_time_morning,
            ReminderSlot::Evening => &user.preferences.reminder_time_evening,
        }
    }
}

impl fmt::Display for ReminderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReminderSlot::Morning => f.write_str("morning"),
            ReminderSlot::Evening => f.write_str("evening"),
        }
    }
}

fn reminder_message(days_ahead: u32, events: &[CalendarEvent]) -> String {
    let header = match days_ahead {
        0 => String::from("📅 今日の予定をお知らせします："),
        1 => String::from("📅 明日の予定をお知らせします："),
        n => format!("📅 今後{}日間の予定をお知らせします：", n),
    };
    let lines: Vec<String> = events
        .iter()
        .take(MAX_LISTED_EVENTS)
        .map(|e| match &e.start_time {
            Some(start) => format!("• {} {}", start, e.title),
            None => format!("• {}", e.title),
        })
        .collect();

    let mut message = format!("{}\n\n{}", header, lines.join("\n"));
    if events.len() > MAX_LISTED_EVENTS {
        message.push_str(&format!(
            "\n\n... 他{}件の予定があります",
            events.len() - MAX_LISTED_EVENTS
        ));
    }
    message
}

/// Push an upcoming-events summary to every user with reminders on.
/// Users with nothing scheduled get no message. Returns how many
/// reminders were delivered.
pub async fn generate_reminders(
    services: &Services,
    transport: &Arc<dyn Transport>,
    slot: ReminderSlot,
) -> Result<usize, Error> {
    let recipients = services.users.list_reminder_recipients().await?;
    let today = services.local_now().date();

    let mut sent = 0;
    for user in recipients {
        if slot.preferred_time(&user).is_empty() {
            continue;
        }
        let days_ahead = user.preferences.reminder_days_ahead;
        let end = today
            .checked_add_days(Days::new(days_ahead.into()))
            .unwrap_or(today);
        let events = services.calendar.list(&user.id, today, end).await;
        if events.is_empty() {
            continue;
        }

        let message = reminder_message(days_ahead, &events);
        match transport.push(&user.id, &message).await {
            Ok(()) => {
                tracing::info!("Sent {} reminder to {}", slot, user.id);
                sent += 1;
            }
            Err(e) => tracing::error!("Failed to send reminder to {}: {}", user.id, e),
        }
    }

    tracing::info!("Generated {} reminders for {}", sent, slot);
    Ok(sent)
}

#[derive(Debug)]
pub struct ReminderJob(pub ReminderSlot);

#[async_trait]
impl PeriodicJob for ReminderJob {
    fn interval(&self) -> Duration {
        Duration::from_secs(60 * 60 * 24)
    }

    async fn run_job(&self, ctx: &JobContext) -> Result<usize, Error> {
        generate_reminders(&ctx.services, &ctx.transport, self.0).await
    }
}
