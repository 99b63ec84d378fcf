use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::{ToolContext, ToolFailure};
use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use crate::subscription::{PLAN_CATALOG, UpgradeError};

#[derive(Serialize)]
pub struct CheckSubscriptionProps {}

#[derive(Serialize)]
pub struct CheckSubscriptionTool {
    pub r#type: ToolType,
    pub function: Function<CheckSubscriptionProps>,
    #[serde(skip)]
    ctx: ToolContext,
}

#[async_trait]
impl ToolCall for CheckSubscriptionTool {
    async fn call(&self, _args: &str) -> Result<Value, Error> {
        match self.ctx.services.gate.subscription_info(&self.ctx.user_id).await? {
            Some(info) => Ok(json!(info)),
            None => Ok(ToolFailure::UserNotFound.to_value()),
        }
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CheckSubscriptionTool {
    pub fn new(ctx: ToolContext) -> Self {
        let function = Function {
            name: String::from("check_subscription"),
            description: String::from("現在の課金プランとAI利用状況を確認します"),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: CheckSubscriptionProps {},
                required: vec![],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ctx,
        }
    }
}

#[derive(Serialize)]
pub struct UpgradeSubscriptionProps {
    pub plan: Property,
}

#[derive(Deserialize)]
pub struct UpgradeSubscriptionArgs {
    pub plan: String,
}

#[derive(Serialize)]
pub struct UpgradeSubscriptionTool {
    pub r#type: ToolType,
    pub function: Function<UpgradeSubscriptionProps>,
    #[serde(skip)]
    ctx: ToolContext,
}

#[async_trait]
impl ToolCall for UpgradeSubscriptionTool {
    async fn call(&self, args: &str) -> Result<Value, Error> {
        let fn_args: UpgradeSubscriptionArgs = serde_json::from_str(args)?;
        match self
            .ctx
            .services
            .gate
            .upgrade(&self.ctx.user_id, &fn_args.plan)
            .await
        {
            Ok(outcome) => Ok(json!({
                "success": true,
                "message": outcome.message(),
                "old_plan": outcome.old_plan,
                "new_plan": outcome.new_plan,
            })),
            Err(UpgradeError::InvalidPlan(plan)) => Ok(ToolFailure::InvalidPlan { plan }.to_value()),
            Err(UpgradeError::UserNotFound) => Ok(ToolFailure::UserNotFound.to_value()),
            Err(UpgradeError::Store(e)) => Err(e),
        }
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl UpgradeSubscriptionTool {
    pub fn new(ctx: ToolContext) -> Self {
        let targets = PLAN_CATALOG
            .iter()
            .filter(|c| c.plan.is_upgrade_target())
            .map(|c| c.plan.as_str().to_string())
            .collect();
        let mut plan = Property::new("string", "アップグレード先のプラン");
        plan.r#enum = Some(targets);

        let function = Function {
            name: String::from("upgrade_subscription"),
            description: String::from("課金プランをアップグレードします"),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: UpgradeSubscriptionProps { plan },
                required: vec![String::from("plan")],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ctx,
        }
    }
}
