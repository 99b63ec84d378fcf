use anyhow::Result;
use clap::{Parser, Subcommand};

pub mod chat;
pub mod init;
pub mod job;
pub mod parse;
pub mod serve;

use job::JobId;

use crate::core::AppConfig;

#[derive(Subcommand)]
enum Command {
    /// Create the database and its schema
    Init {
        #[arg(long, action, default_value = "false")]
        db: bool,
    },
    /// Run the API server
    Serve {
        /// Set the server host address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Set the server port
        #[arg(long, default_value = "2222")]
        port: String,
    },
    /// Run a maintenance job once
    Job {
        #[arg(long, value_enum)]
        id: JobId,
    },
    /// Show the intent and entities extracted from a message
    Parse {
        #[arg(long)]
        text: String,
    },
    /// Talk to the bot from the terminal as the given user
    Chat {
        #[arg(long, default_value = "local-user")]
        user: String,
        /// Use an in-memory database and calendar instead of the real ones
        #[arg(long, action, default_value = "false")]
        offline: bool,
    },
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

pub async fn run() -> Result<()> {
    let args = Cli::parse();
    let config = AppConfig::default();

    match args.command {
        Some(Command::Init { db }) => {
            init::run(db, &config.db_path).await?;
        }
        Some(Command::Serve { host, port }) => {
            serve::run(host, port, config).await?;
        }
        Some(Command::Job { id }) => {
            job::run(id, config).await?;
        }
        Some(Command::Parse { text }) => {
            parse::run(&text, &config)?;
        }
        Some(Command::Chat { user, offline }) => {
            chat::run(&user, offline, config).await?;
        }
        None => {}
    }

    Ok(())
}
