use anyhow::Result;
use serde_json::json;

use crate::core::{AppConfig, Clock, SystemClock};
use crate::nlp;

pub fn run(text: &str, config: &AppConfig) -> Result<()> {
    let now = SystemClock.local_now(config.timezone());
    let (intent, entities) = nlp::process_message(text, now);
    let output = json!({
        "intent": intent,
        "entities": entities,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
