//! Per-user conversation history used to give the AI path context.
pub mod db;
pub mod models;
pub mod service;

pub use db::ConversationStore;
pub use models::{ConversationTurn, TurnRole};
pub use service::ConversationService;
