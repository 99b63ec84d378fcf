use anyhow::{Error, Result};
use async_trait::async_trait;

use super::Transport;

/// Prints messages to stdout. Used by the local REPL and offline jobs.
#[derive(Debug, Default)]
pub struct ConsoleTransport;

#[async_trait]
impl Transport for ConsoleTransport {
    async fn reply(&self, _reply_token: &str, text: &str) -> Result<(), Error> {
        println!("{}", text);
        Ok(())
    }

    async fn push(&self, user_id: &str, text: &str) -> Result<(), Error> {
        println!("[push to {}]\n{}", user_id, text);
        Ok(())
    }
}
