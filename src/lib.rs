pub mod agent;
pub mod api;
pub mod calendar;
pub mod cli;
pub mod conversation;
pub mod core;
pub mod dispatch;
pub mod google;
pub mod jobs;
pub mod messaging;
pub mod nlp;
pub mod openai;
pub mod pattern;
pub mod subscription;
pub mod users;
