use std::sync::Arc;

use anyhow::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tokio_rusqlite::Connection;

use super::models::{ConversationTurn, TurnRole};
use crate::core::Clock;

/// How far back `last_referenced_entity` looks.
const REFERENCE_WINDOW_TURNS: usize = 20;
const REFERENCE_WINDOW_HOURS: i64 = 2;

type TurnRow = (String, String, String, String, Option<String>, Option<String>, i64);

fn turn_from_row(row: TurnRow) -> Result<ConversationTurn, Error> {
    let (id, user_id, role, content, tool_call, metadata, millis) = row;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| anyhow::anyhow!("Invalid timestamp {} for turn {}", millis, id))?;
    Ok(ConversationTurn {
        id,
        user_id,
        role: role.parse()?,
        content,
        tool_call: tool_call.map(|s| serde_json::from_str(&s)).transpose()?,
        metadata: metadata.map(|s| serde_json::from_str(&s)).transpose()?,
        timestamp,
    })
}

#[derive(Clone)]
pub struct ConversationStore {
    db: Connection,
    clock: Arc<dyn Clock>,
}

impl ConversationStore {
    pub fn new(db: Connection, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Build a turn stamped with the store's clock.
    pub fn turn(&self, user_id: &str, role: TurnRole, content: &str) -> ConversationTurn {
        ConversationTurn::new(user_id, role, content, self.clock.now())
    }

    /// Insert a turn. Appending the same turn twice is a no-op.
    pub async fn append(&self, turn: &ConversationTurn) -> Result<(), Error> {
        let id = turn.id.clone();
        let user_id = turn.user_id.clone();
        let role = turn.role.as_str();
        let content = turn.content.clone();
        let tool_call = turn.tool_call.as_ref().map(Value::to_string);
        let metadata = turn.metadata.as_ref().map(Value::to_string);
        let timestamp = turn.timestamp.timestamp_millis();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO conversation_turn (id, user_id, role, content, tool_call, metadata, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![id, user_id, role, content, tool_call, metadata, timestamp],
                )?;
                Ok(())
            })
            .await?;

        Ok(())
    }

    /// The latest `limit` turns from the last `hours_back` hours, oldest first.
    pub async fn recent(
        &self,
        user_id: &str,
        limit: usize,
        hours_back: i64,
    ) -> Result<Vec<ConversationTurn>, Error> {
        let user_id = user_id.to_owned();
        let since = (self.clock.now() - Duration::hours(hours_back)).timestamp_millis();
        let limit = limit as i64;

        let rows: Vec<TurnRow> = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, user_id, role, content, tool_call, metadata, timestamp
                     FROM (
                       SELECT rowid AS seq, * FROM conversation_turn
                       WHERE user_id = ?1 AND timestamp >= ?2
                       ORDER BY timestamp DESC, seq DESC
                       LIMIT ?3
                     )
                     ORDER BY timestamp ASC, seq ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![user_id, since, limit], |r| {
                        Ok((
                            r.get(0)?,
                            r.get(1)?,
                            r.get(2)?,
                            r.get(3)?,
                            r.get(4)?,
                            r.get(5)?,
                            r.get(6)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await?;

        rows.into_iter().map(turn_from_row).collect()
    }

    /// The event most recently talked about, so a follow-up like
    /// "その会議を削除" can be resolved.
    pub async fn last_referenced_entity(&self, user_id: &str) -> Result<Option<Value>, Error> {
        let turns = self
            .recent(user_id, REFERENCE_WINDOW_TURNS, REFERENCE_WINDOW_HOURS)
            .await?;
        Ok(turns
            .iter()
            .rev()
            .find_map(|t| t.referenced_event().cloned()))
    }

    /// Delete turns older than `older_than_days`. Returns the number removed.
    pub async fn prune(&self, older_than_days: i64) -> Result<usize, Error> {
        let cutoff = (self.clock.now() - Duration::days(older_than_days)).timestamp_millis();
        let deleted = self
            .db
            .call(move |conn| {
                let count =
                    conn.execute("DELETE FROM conversation_turn WHERE timestamp < ?1", [cutoff])?;
                Ok(count)
            })
            .await?;

        tracing::info!("Pruned {} conversation turns", deleted);
        Ok(deleted)
    }
}
