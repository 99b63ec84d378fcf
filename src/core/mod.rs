pub mod clock;
pub mod config;
pub mod db;
pub mod services;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use services::Services;
