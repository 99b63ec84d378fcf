//! Test utilities for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Error, Result};
use async_trait::async_trait;
use axum::Router;
use chrono::FixedOffset;
use tempfile::TempDir;

use chatcal::api::{AppState, app};
use chatcal::calendar::MemoryCalendar;
use chatcal::core::db::{async_db, initialize_db};
use chatcal::core::{AppConfig, Services, SystemClock};
use chatcal::dispatch::Dispatcher;
use chatcal::messaging::Transport;
use chatcal::users::{SqliteUserStore, User, UserStore};

/// Records outbound messages instead of sending them.
#[derive(Default)]
pub struct RecordingTransport {
    pub replies: Mutex<Vec<(String, String)>>,
    pub pushes: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), Error> {
        self.replies
            .lock()
            .unwrap()
            .push((reply_token.to_string(), text.to_string()));
        Ok(())
    }

    async fn push(&self, user_id: &str, text: &str) -> Result<(), Error> {
        self.pushes
            .lock()
            .unwrap()
            .push((user_id.to_string(), text.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub services: Services,
    pub calendar: Arc<MemoryCalendar>,
    // Held so the database directory outlives the test
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> AppConfig {
    let db_path = dir.path().join("db");
    AppConfig {
        storage_path: dir.path().display().to_string(),
        db_path: db_path.display().to_string(),
        base_url: String::from("https://bot.example.com"),
        line_api_hostname: String::from("http://localhost:1"),
        line_channel_access_token: String::from("test-token"),
        google_client_id: String::from("test_client_id"),
        google_client_secret: String::from("test_client_secret"),
        google_oauth_hostname: String::from("http://localhost:1"),
        google_calendar_hostname: String::from("http://localhost:1"),
        openai_model: String::from("gpt-4o-mini"),
        openai_api_hostname: String::from("http://localhost:1"),
        openai_api_key: None,
        use_ai_agent: false,
        timezone_offset_hours: 9,
        conversation_retention_days: 7,
    }
}

/// An application on a fresh on-disk database with an in-memory
/// calendar. Replies go to `transport`.
pub async fn test_app_with_transport(transport: Arc<dyn Transport>) -> TestApp {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = test_config(&dir);
    std::fs::create_dir_all(&config.db_path).expect("Failed to create db directory");

    let db = async_db(&config.db_path)
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        initialize_db(conn)?;
        Ok(())
    })
    .await
    .unwrap();

    let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db.clone()));
    let calendar = Arc::new(MemoryCalendar::new());
    let services = Services::new(
        db.clone(),
        users,
        calendar.clone(),
        Arc::new(SystemClock),
        FixedOffset::east_opt(9 * 3600).unwrap(),
    );
    let dispatcher = Dispatcher::new(services.clone(), transport.clone(), &config.linking_url());
    let state = AppState::new(db, config, services.clone(), transport, dispatcher);

    TestApp {
        router: app(Arc::new(state)),
        services,
        calendar,
        _dir: dir,
    }
}

pub async fn test_app() -> (TestApp, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let app = test_app_with_transport(transport.clone()).await;
    (app, transport)
}

pub async fn add_linked_user(services: &Services, id: &str) {
    let mut user = User::new(id);
    user.google_email = Some(format!("{}@example.com", id));
    user.google_refresh_token = Some(String::from("refresh"));
    services.users.upsert(&user).await.unwrap();
}

/// Poll `check` until it passes. Message handling runs in a spawned
/// task, so its effects show up some time after the response.
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

pub fn line_text_event(user_id: &str, text: &str, reply_token: &str) -> serde_json::Value {
    serde_json::json!({
        "type": "message",
        "replyToken": reply_token,
        "timestamp": 1738112400000i64,
        "source": {"type": "user", "userId": user_id},
        "message": {"type": "text", "id": "100001", "text": text}
    })
}

pub async fn body_to_string(body: axum::body::Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
