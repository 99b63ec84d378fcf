use std::fmt;
use std::sync::Arc;

use anyhow::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use thiserror::Error;

use super::plans::{Plan, UnknownPlan};
use crate::core::Clock;
use crate::users::UserStore;

/// Length of a usage period before the AI call counter is reset.
const RESET_PERIOD_DAYS: i64 = 30;
const SUBSCRIPTION_DAYS: i64 = 30;

/// Why the AI path is not available. Not an error, the pattern path
/// still serves the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    UserNotFound,
    QuotaExceeded { limit: u32 },
    AiModeDisabled,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::UserNotFound => f.write_str("ユーザー情報が見つかりません"),
            DenialReason::QuotaExceeded { limit } => write!(
                f,
                "今月のAI利用回数上限（{limit}回）に達しました。\nプランをアップグレードするか、来月までお待ちください。"
            ),
            DenialReason::AiModeDisabled => {
                f.write_str("AIモードが無効になっています。\n設定から有効にしてください。")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    Allowed,
    Denied(DenialReason),
}

impl Eligibility {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Eligibility::Allowed)
    }

    /// Empty when allowed.
    pub fn reason(&self) -> String {
        match self {
            Eligibility::Allowed => String::new(),
            Eligibility::Denied(reason) => reason.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("無効なプランです: {0}")]
    InvalidPlan(String),
    #[error("ユーザー情報が見つかりません")]
    UserNotFound,
    #[error(transparent)]
    Store(#[from] Error),
}

impl From<UnknownPlan> for UpgradeError {
    fn from(err: UnknownPlan) -> Self {
        UpgradeError::InvalidPlan(err.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeOutcome {
    pub old_plan: Plan,
    pub new_plan: Plan,
}

impl UpgradeOutcome {
    pub fn message(&self) -> String {
        let config = self.new_plan.config();
        let mode = if config.use_ai_agent {
            "AIモード"
        } else {
            "パターン認識モード"
        };
        format!("{}にアップグレードしました！\n{}が利用可能です。", config.name, mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubscriptionInfo {
    pub plan: Plan,
    pub plan_name: &'static str,
    pub price: u32,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub ai_calls_used: u32,
    pub ai_calls_limit: Option<u32>,
    pub ai_calls_remaining: Option<u32>,
    pub ai_agent_feature: bool,
}

/// Decides whether a user may take the AI path and tracks their usage.
#[derive(Clone)]
pub struct SubscriptionGate {
    users: Arc<dyn UserStore>,
    clock: Arc<dyn Clock>,
}

impl SubscriptionGate {
    pub fn new(users: Arc<dyn UserStore>, clock: Arc<dyn Clock>) -> Self {
        Self { users, clock }
    }

    pub async fn check_eligibility(&self, user_id: &str) -> Result<Eligibility, Error> {
        let Some(user) = self.users.get(user_id).await? else {
            return Ok(Eligibility::Denied(DenialReason::UserNotFound));
        };

        let mut sub = user.subscription;
        if sub.plan == Plan::Premium {
            return Ok(Eligibility::Allowed);
        }

        let now = self.clock.now();
        let reset_due = sub
            .last_reset_at
            .is_none_or(|last| now - last >= Duration::days(RESET_PERIOD_DAYS));
        if reset_due {
            tracing::info!("Resetting AI usage counter for user {}", user_id);
            sub.ai_calls_used = 0;
            sub.last_reset_at = Some(now);
            self.users.update_subscription(user_id, &sub).await?;
        }

        if let Some(limit) = sub.plan.config().ai_calls_limit
            && sub.ai_calls_used >= limit
        {
            return Ok(Eligibility::Denied(DenialReason::QuotaExceeded { limit }));
        }

        if !user.preferences.use_ai_agent {
            return Ok(Eligibility::Denied(DenialReason::AiModeDisabled));
        }

        Ok(Eligibility::Allowed)
    }

    /// Count one AI call. Returns `false` if the user does not exist.
    pub async fn increment_usage(&self, user_id: &str) -> Result<bool, Error> {
        let Some(user) = self.users.get(user_id).await? else {
            return Ok(false);
        };
        let mut sub = user.subscription;
        sub.ai_calls_used = sub.ai_calls_used.saturating_add(1);
        self.users.update_subscription(user_id, &sub).await
    }

    pub async fn upgrade(
        &self,
        user_id: &str,
        plan_name: &str,
    ) -> Result<UpgradeOutcome, UpgradeError> {
        let new_plan: Plan = plan_name.parse()?;
        if !new_plan.is_upgrade_target() {
            return Err(UpgradeError::InvalidPlan(plan_name.to_string()));
        }

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(UpgradeError::UserNotFound)?;
        let old_plan = user.subscription.plan;
        let config = new_plan.config();

        let mut sub = user.subscription;
        sub.plan = new_plan;
        sub.is_active = true;
        sub.expires_at = Some(self.clock.now() + Duration::days(SUBSCRIPTION_DAYS));
        sub.ai_calls_limit = config.ai_calls_limit;

        let mut prefs = user.preferences;
        if config.use_ai_agent {
            prefs.use_ai_agent = true;
        }

        if !self
            .users
            .update_subscription_and_preferences(user_id, &sub, &prefs)
            .await?
        {
            return Err(UpgradeError::UserNotFound);
        }

        tracing::info!("User {} upgraded from {} to {}", user_id, old_plan, new_plan);
        Ok(UpgradeOutcome { old_plan, new_plan })
    }

    pub async fn subscription_info(&self, user_id: &str) -> Result<Option<SubscriptionInfo>, Error> {
        let Some(user) = self.users.get(user_id).await? else {
            return Ok(None);
        };
        let sub = user.subscription;
        let config = sub.plan.config();
        let limit = config.ai_calls_limit;

        Ok(Some(SubscriptionInfo {
            plan: sub.plan,
            plan_name: config.name,
            price: config.price,
            is_active: sub.is_active,
            expires_at: sub.expires_at,
            ai_calls_used: sub.ai_calls_used,
            ai_calls_limit: limit,
            ai_calls_remaining: limit.map(|l| l.saturating_sub(sub.ai_calls_used)),
            ai_agent_feature: config.use_ai_agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::core::db::memory_db;
    use crate::users::{SqliteUserStore, SubscriptionState, User};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 29, 3, 0, 0).unwrap()
    }

    async fn gate_with(user: User) -> (SubscriptionGate, Arc<dyn UserStore>) {
        let store: Arc<dyn UserStore> = Arc::new(SqliteUserStore::new(memory_db().await.unwrap()));
        store.upsert(&user).await.unwrap();
        let gate = SubscriptionGate::new(store.clone(), Arc::new(FixedClock(now())));
        (gate, store)
    }

    fn user(plan: Plan, used: u32, opted_in: bool) -> User {
        let mut user = User::new("U1");
        user.google_email = Some(String::from("u1@example.com"));
        user.preferences.use_ai_agent = opted_in;
        user.subscription = SubscriptionState {
            plan,
            ai_calls_used: used,
            ai_calls_limit: plan.config().ai_calls_limit,
            last_reset_at: Some(now() - Duration::days(3)),
            ..Default::default()
        };
        user
    }

    #[tokio::test]
    async fn test_quota_exceeded_regardless_of_opt_in() {
        for opted_in in [true, false] {
            let (gate, _) = gate_with(user(Plan::Free, 10, opted_in)).await;
            let result = gate.check_eligibility("U1").await.unwrap();
            assert_eq!(
                result,
                Eligibility::Denied(DenialReason::QuotaExceeded { limit: 10 })
            );
            assert!(result.reason().contains("10回"));
        }
    }

    #[tokio::test]
    async fn test_premium_always_allowed() {
        let (gate, _) = gate_with(user(Plan::Premium, 100_000, false)).await;
        let result = gate.check_eligibility("U1").await.unwrap();
        assert!(result.is_allowed());
        assert_eq!(result.reason(), "");
    }

    #[tokio::test]
    async fn test_requires_opt_in() {
        let (gate, _) = gate_with(user(Plan::Basic, 0, false)).await;
        assert_eq!(
            gate.check_eligibility("U1").await.unwrap(),
            Eligibility::Denied(DenialReason::AiModeDisabled)
        );

        let (gate, _) = gate_with(user(Plan::Basic, 0, true)).await;
        assert!(gate.check_eligibility("U1").await.unwrap().is_allowed());
    }

    #[tokio::test]
    async fn test_missing_user_denied() {
        let (gate, _) = gate_with(user(Plan::Basic, 0, true)).await;
        assert_eq!(
            gate.check_eligibility("nobody").await.unwrap(),
            Eligibility::Denied(DenialReason::UserNotFound)
        );
    }

    #[tokio::test]
    async fn test_counter_resets_after_period() {
        let mut stale = user(Plan::Free, 10, true);
        stale.subscription.last_reset_at = Some(now() - Duration::days(31));
        let (gate, store) = gate_with(stale).await;

        assert!(gate.check_eligibility("U1").await.unwrap().is_allowed());

        let sub = store.get("U1").await.unwrap().unwrap().subscription;
        assert_eq!(sub.ai_calls_used, 0);
        assert_eq!(sub.last_reset_at, Some(now()));
    }

    #[tokio::test]
    async fn test_increment_usage() {
        let (gate, store) = gate_with(user(Plan::Basic, 4, true)).await;
        assert!(gate.increment_usage("U1").await.unwrap());
        assert_eq!(store.get("U1").await.unwrap().unwrap().subscription.ai_calls_used, 5);
        assert!(!gate.increment_usage("nobody").await.unwrap());
    }

    #[tokio::test]
    async fn test_upgrade_forces_ai_opt_in() {
        let (gate, store) = gate_with(user(Plan::Free, 10, false)).await;
        let outcome = gate.upgrade("U1", "basic").await.unwrap();
        assert_eq!(outcome.old_plan, Plan::Free);
        assert_eq!(outcome.new_plan, Plan::Basic);
        assert!(outcome.message().contains("ベーシックプラン"));

        let stored = store.get("U1").await.unwrap().unwrap();
        assert!(stored.preferences.use_ai_agent);
        assert_eq!(stored.subscription.plan, Plan::Basic);
        assert_eq!(stored.subscription.ai_calls_limit, Some(100));
        assert_eq!(stored.subscription.expires_at, Some(now() + Duration::days(30)));
    }

    #[tokio::test]
    async fn test_upgrade_rejects_unknown_and_free() {
        let (gate, _) = gate_with(user(Plan::Free, 0, false)).await;
        assert!(matches!(
            gate.upgrade("U1", "gold").await,
            Err(UpgradeError::InvalidPlan(_))
        ));
        assert!(matches!(
            gate.upgrade("U1", "free").await,
            Err(UpgradeError::InvalidPlan(_))
        ));
        assert!(matches!(
            gate.upgrade("nobody", "premium").await,
            Err(UpgradeError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn test_subscription_info() {
        let (gate, _) = gate_with(user(Plan::Basic, 40, true)).await;
        let info = gate.subscription_info("U1").await.unwrap().unwrap();
        assert_eq!(info.plan_name, "ベーシックプラン");
        assert_eq!(info.ai_calls_remaining, Some(60));
        assert!(info.ai_agent_feature);
        assert!(gate.subscription_info("nobody").await.unwrap().is_none());
    }
}
