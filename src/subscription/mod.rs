pub mod gate;
pub mod plans;

pub use gate::{DenialReason, Eligibility, SubscriptionGate, SubscriptionInfo, UpgradeError, UpgradeOutcome};
pub use plans::{PLAN_CATALOG, Plan, PlanConfig};
