use anyhow::{Error, Result};
use async_trait::async_trait;
use rusqlite::OptionalExtension;
use tokio_rusqlite::Connection;

use super::models::{SubscriptionState, User, UserPreferences};

/// Persistence for users, their preferences, and subscription state.
///
/// Updates return `false` when the user does not exist rather than
/// creating a new record.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, user_id: &str) -> Result<Option<User>, Error>;

    async fn upsert(&self, user: &User) -> Result<(), Error>;

    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> Result<bool, Error>;

    async fn update_subscription(
        &self,
        user_id: &str,
        subscription: &SubscriptionState,
    ) -> Result<bool, Error>;

    /// Writes both documents in a single transaction.
    async fn update_subscription_and_preferences(
        &self,
        user_id: &str,
        subscription: &SubscriptionState,
        preferences: &UserPreferences,
    ) -> Result<bool, Error>;

    /// Active, linked users that have reminders turned on.
    async fn list_reminder_recipients(&self) -> Result<Vec<User>, Error>;
}

type UserRow = (String, Option<String>, Option<String>, String, String, bool);

const SELECT_USER: &str = "SELECT id, google_email, google_refresh_token, preferences, subscription, is_active FROM user";

fn user_from_row(row: UserRow) -> Result<User, Error> {
    let (id, google_email, google_refresh_token, preferences, subscription, is_active) = row;
    Ok(User {
        id,
        google_email,
        google_refresh_token,
        preferences: serde_json::from_str(&preferences)?,
        subscription: serde_json::from_str(&subscription)?,
        is_active,
    })
}

#[derive(Clone)]
pub struct SqliteUserStore {
    db: Connection,
}

impl SqliteUserStore {
    pub fn new(db: Connection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(&self, user_id: &str) -> Result<Option<User>, Error> {
        let id = user_id.to_owned();
        let row: Option<UserRow> = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("{SELECT_USER} WHERE id = ?1"))?;
                let row = stmt
                    .query_row([id], |r| {
                        Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
                    })
                    .optional()?;
                Ok(row)
            })
            .await?;

        row.map(user_from_row).transpose()
    }

    async fn upsert(&self, user: &User) -> Result<(), Error> {
        let id = user.id.clone();
        let email = user.google_email.clone();
        let token = user.google_refresh_token.clone();
        let preferences = serde_json::to_string(&user.preferences)?;
        let subscription = serde_json::to_string(&user.subscription)?;
        let is_active = user.is_active;

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO user (id, google_email, google_refresh_token, preferences, subscription, is_active)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT(id) DO UPDATE SET
                       google_email = excluded.google_email,
                       google_refresh_token = excluded.google_refresh_token,
                       preferences = excluded.preferences,
                       subscription = excluded.subscription,
                       is_active = excluded.is_active,
                       updated_at = CURRENT_TIMESTAMP",
                    rusqlite::params![id, email, token, preferences, subscription, is_active],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    async fn update_preferences(
        &self,
        user_id: &str,
        preferences: &UserPreferences,
    ) -> Result<bool, Error> {
        let id = user_id.to_owned();
        let data = serde_json::to_string(preferences)?;
        let updated = self
            .db
            .call(move |conn| {
                let count = conn.execute(
                    "UPDATE user SET preferences = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                    [data, id],
                )?;
                Ok(count)
            })
            .await?;

        Ok(updated > 0)
    }

    async fn update_subscription(
        &self,
        user_id: &str,
        subscription: &SubscriptionState,
    ) -> Result<bool, Error> {
        let id = user_id.to_owned();
        let data = serde_json::to_string(subscription)?;
        let updated = self
            .db
            .call(move |conn| {
                let count = conn.execute(
                    "UPDATE user SET subscription = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
                    [data, id],
                )?;
                Ok(count)
            })
            .await?;

        Ok(updated > 0)
    }

    async fn update_subscription_and_preferences(
        &self,
        user_id: &str,
        subscription: &SubscriptionState,
        preferences: &UserPreferences,
    ) -> Result<bool, Error> {
        let id = user_id.to_owned();
        let sub = serde_json::to_string(subscription)?;
        let prefs = serde_json::to_string(preferences)?;
        let updated = self
            .db
            .call(move |conn| {
                // Plan and opt-in flag must never disagree
                let count = conn.execute(
                    "UPDATE user SET subscription = ?1, preferences = ?2, updated_at = CURRENT_TIMESTAMP WHERE id = ?3",
                    [sub, prefs, id],
                )?;
                Ok(count)
            })
            .await?;

        Ok(updated > 0)
    }

    async fn list_reminder_recipients(&self) -> Result<Vec<User>, Error> {
        let rows: Vec<UserRow> = self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare(&format!(
                    "{SELECT_USER}
                     WHERE is_active = 1
                       AND google_email IS NOT NULL
                       AND COALESCE(json_extract(preferences, '$.reminder_enabled'), 1) = 1
                     ORDER BY id"
                ))?;
                let rows = stmt
                    .query_map([], |r| {
                        Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?, r.get(5)?))
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(user_from_row).collect()
    }
}
