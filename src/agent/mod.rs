pub mod core;
pub mod prompt;
pub mod tools;

pub use self::core::{APOLOGY, AgentReply, CalendarAgent};
