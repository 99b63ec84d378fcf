//! Pattern-based natural language handling for Japanese calendar
//! requests: date/time expressions, intent scoring and entity slots.

pub mod datetime;
pub mod entities;
pub mod intent;

use chrono::NaiveDateTime;

pub use datetime::{ParsedDateTime, parse};
pub use entities::{EntityBag, EntityError, extract};
pub use intent::{Intent, classify};

/// Fold full-width digits and the punctuation the patterns care about
/// into their ASCII forms.
pub fn normalize(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '：' => ':',
            '／' => '/',
            '＠' => '@',
            '？' => '?',
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// Classify a message and pull out the entities relevant to its intent.
pub fn process_message(text: &str, now: NaiveDateTime) -> (Intent, EntityBag) {
    let text = text.trim();
    let intent = classify(text);
    let entities = extract(intent, text, now);
    tracing::info!(
        "NLP processed: '{}' -> intent: {}, entities: {:?}",
        text,
        intent,
        entities
    );
    (intent, entities)
}
