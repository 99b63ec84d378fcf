use std::sync::Arc;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use crate::api::init_tracing;
use crate::calendar::MemoryCalendar;
use crate::core::db::{async_db, memory_db};
use crate::core::{AppConfig, Services, SystemClock};
use crate::dispatch::Dispatcher;
use crate::messaging::{ConsoleTransport, Transport};
use crate::users::{SqliteUserStore, User, UserStore};

/// Services backed by an in-memory database and calendar, with
/// `user_id` already linked.
async fn offline_services(user_id: &str, config: &AppConfig) -> Result<Services> {
    let db = memory_db().await?;
    let users: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(db.clone()));
    let mut user = User::new(user_id);
    user.google_email = Some(format!("{}@localhost", user_id));
    users.upsert(&user).await?;

    Ok(Services::new(
        db,
        users,
        Arc::new(MemoryCalendar::new()),
        Arc::new(SystemClock),
        config.timezone(),
    ))
}

pub async fn run(user_id: &str, offline: bool, config: AppConfig) -> Result<()> {
    init_tracing();

    let services = if offline {
        offline_services(user_id, &config).await?
    } else {
        let db = async_db(&config.db_path).await?;
        Services::from_config(&config, db)
    };
    let transport: Arc<dyn Transport> = Arc::new(ConsoleTransport);
    let dispatcher = Dispatcher::from_config(&config, services, transport);

    let mut rl = DefaultEditor::new()?;
    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                dispatcher.handle_message(user_id, line, "console").await;
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    Ok(())
}
