pub mod db;
pub mod models;

pub use db::{SqliteUserStore, UserStore};
pub use models::{PreferencesUpdate, SubscriptionState, User, UserPreferences};
