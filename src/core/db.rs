use std::path::Path;

use anyhow::{Error, Result};
use rusqlite::Connection as SyncConnection;
use tokio_rusqlite::Connection;

const DB_FILE_NAME: &str = "chatcal.sqlite";

/// Open the application database stored under `db_dir`.
pub async fn async_db(db_dir: &str) -> Result<Connection, Error> {
    let path = Path::new(db_dir).join(DB_FILE_NAME);
    let db = Connection::open(path).await?;
    Ok(db)
}

/// Open a throwaway in-memory database with the schema applied.
pub async fn memory_db() -> Result<Connection, Error> {
    let db = Connection::open_in_memory().await?;
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await?;
    Ok(db)
}

/// Create all tables and indices. Safe to run repeatedly.
pub fn initialize_db(conn: &SyncConnection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS user (
            id TEXT PRIMARY KEY,
            google_email TEXT,
            google_refresh_token TEXT,
            preferences TEXT NOT NULL DEFAULT '{}',
            subscription TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE TABLE IF NOT EXISTS conversation_turn (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            tool_call TEXT,
            metadata TEXT,
            timestamp INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_conversation_turn_user_ts
            ON conversation_turn (user_id, timestamp);
        "#,
    )
}
