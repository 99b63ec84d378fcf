use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanConfig {
    pub plan: Plan,
    pub name: &'static str,
    /// Monthly AI call allowance, `None` when unlimited
    pub ai_calls_limit: Option<u32>,
    pub use_ai_agent: bool,
    /// Monthly price in yen
    pub price: u32,
}

pub static PLAN_CATALOG: [PlanConfig; 3] = [
    PlanConfig {
        plan: Plan::Free,
        name: "無料プラン",
        ai_calls_limit: Some(10),
        use_ai_agent: false,
        price: 0,
    },
    PlanConfig {
        plan: Plan::Basic,
        name: "ベーシックプラン",
        ai_calls_limit: Some(100),
        use_ai_agent: true,
        price: 500,
    },
    PlanConfig {
        plan: Plan::Premium,
        name: "プレミアムプラン",
        ai_calls_limit: None,
        use_ai_agent: true,
        price: 1500,
    },
];

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Premium => "premium",
        }
    }

    pub fn config(&self) -> &'static PlanConfig {
        PLAN_CATALOG
            .iter()
            .find(|c| c.plan == *self)
            .unwrap_or(&PLAN_CATALOG[0])
    }

    /// Plans a user can move to. The free plan is never an upgrade target.
    pub fn is_upgrade_target(&self) -> bool {
        self.config().price > 0
    }

    /// Look for a plan mentioned by id or display name in free text.
    /// The highest plan wins when more than one is named.
    pub fn find_in_text(text: &str) -> Option<Plan> {
        let lowered = text.to_lowercase();
        PLAN_CATALOG
            .iter()
            .rev()
            .filter(|c| c.plan.is_upgrade_target())
            .find(|c| {
                let short = c.name.trim_end_matches("プラン");
                lowered.contains(c.plan.as_str()) || text.contains(short)
            })
            .map(|c| c.plan)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plan: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PLAN_CATALOG
            .iter()
            .map(|c| c.plan)
            .find(|p| p.as_str() == s.trim().to_lowercase())
            .ok_or_else(|| UnknownPlan(s.to_string()))
    }
}
