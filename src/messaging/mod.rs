pub mod console;
pub mod line;

use anyhow::{Error, Result};
use async_trait::async_trait;

pub use console::ConsoleTransport;
pub use line::LineMessaging;

/// Outbound text messages to chat users.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Answer an inbound message using its reply token.
    async fn reply(&self, reply_token: &str, text: &str) -> Result<(), Error>;

    /// Send an unsolicited message to a user.
    async fn push(&self, user_id: &str, text: &str) -> Result<(), Error>;
}
