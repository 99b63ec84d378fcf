use std::sync::Arc;

use anyhow::{Error, Result, bail};
use serde_json::Value;

use super::prompt::system_prompt;
use super::tools::{ToolContext, ToolFailure, calendar_tools};
use crate::conversation::{ConversationTurn, TurnRole};
use crate::core::Services;
use crate::openai::{
    BoxedToolCall, FunctionCall, LanguageModel, Message, ModelReply, Role, parse_reply,
};

pub const APOLOGY: &str = "申し訳ございません。処理中にエラーが発生しました。";

/// Prior turns sent along with each request.
const HISTORY_TURNS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct AgentReply {
    pub text: String,
    pub tool_results: Vec<Value>,
    /// `false` when the reply is the apology for a failed turn
    pub succeeded: bool,
}

impl AgentReply {
    pub fn apology() -> Self {
        Self {
            text: APOLOGY.to_string(),
            tool_results: Vec::new(),
            succeeded: false,
        }
    }
}

/// One user turn. A tool can be executed at most once: the follow-up
/// request is sent without tools and a tool call in its answer fails
/// the turn.
#[derive(Debug)]
enum TurnState {
    AwaitingModel,
    ExecutingTool(FunctionCall),
    AwaitingFollowup,
    Done(String),
}

/// Answers a message with a language model that can call into the
/// calendar, reminder and subscription operations.
pub struct CalendarAgent {
    model: Arc<dyn LanguageModel>,
    services: Services,
}

impl CalendarAgent {
    pub fn new(model: Arc<dyn LanguageModel>, services: Services) -> Self {
        Self { model, services }
    }

    /// Never fails. Any error along the way becomes the apology with no
    /// tool results.
    pub async fn process_message(
        &self,
        user_id: &str,
        message: &str,
        history: &[ConversationTurn],
        last_event: Option<&Value>,
    ) -> AgentReply {
        match self.run_turn(user_id, message, history, last_event).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("AI agent error for user {}: {}", user_id, e);
                AgentReply::apology()
            }
        }
    }

    fn build_messages(
        &self,
        message: &str,
        history: &[ConversationTurn],
        last_event: Option<&Value>,
    ) -> Result<Vec<Message>, Error> {
        let offset_hours = self.services.tz.local_minus_utc() / 3600;
        let prompt = system_prompt(self.services.local_now(), offset_hours, last_event)?;

        let mut messages = vec![Message::new(Role::System, &prompt)];
        let usable: Vec<&ConversationTurn> =
            history.iter().filter(|t| !t.content.is_empty()).collect();
        let skip = usable.len().saturating_sub(HISTORY_TURNS);
        for turn in usable.into_iter().skip(skip) {
            let role = match turn.role {
                TurnRole::User => Role::User,
                TurnRole::Assistant => Role::Assistant,
                TurnRole::System => Role::System,
            };
            messages.push(Message::new(role, &turn.content));
        }
        messages.push(Message::new(Role::User, message));
        Ok(messages)
    }

    async fn run_turn(
        &self,
        user_id: &str,
        message: &str,
        history: &[ConversationTurn],
        last_event: Option<&Value>,
    ) -> Result<AgentReply, Error> {
        let mut messages = self.build_messages(message, history, last_event)?;
        let ctx = ToolContext::new(user_id, &self.services);
        let tools = Some(calendar_tools(&ctx));
        let mut tool_results = Vec::new();

        let mut state = TurnState::AwaitingModel;
        loop {
            state = match state {
                TurnState::AwaitingModel => {
                    let response = self.model.complete(&messages, &tools).await?;
                    match parse_reply(&response)? {
                        ModelReply::Text(text) => TurnState::Done(text),
                        ModelReply::ToolCalls(calls) => {
                            if calls.len() > 1 {
                                tracing::warn!(
                                    "Model proposed {} tool calls, only the first is executed",
                                    calls.len()
                                );
                            }
                            let Some(call) = calls.into_iter().next() else {
                                bail!("Model returned an empty tool call list");
                            };
                            TurnState::ExecutingTool(call)
                        }
                    }
                }
                TurnState::ExecutingTool(call) => {
                    tracing::info!(
                        "AI calling function {} for user {} with args: {}",
                        call.function.name,
                        user_id,
                        call.function.arguments
                    );
                    let result = execute_tool(tools.as_deref().unwrap_or_default(), &call).await?;
                    messages.push(Message::new_tool_call_request(vec![call.clone()]));
                    messages.push(Message::new_tool_call_response(&result.to_string(), &call.id));
                    tool_results.push(result);
                    TurnState::AwaitingFollowup
                }
                TurnState::AwaitingFollowup => {
                    let response = self.model.complete(&messages, &None).await?;
                    match parse_reply(&response)? {
                        ModelReply::Text(text) => TurnState::Done(text),
                        ModelReply::ToolCalls(_) => {
                            bail!("Model requested a second tool call in one turn")
                        }
                    }
                }
                TurnState::Done(text) => {
                    if text.trim().is_empty() {
                        bail!("Model returned an empty reply");
                    }
                    return Ok(AgentReply {
                        text,
                        tool_results,
                        succeeded: true,
                    });
                }
            };
        }
    }
}

async fn execute_tool(tools: &[BoxedToolCall], call: &FunctionCall) -> Result<Value, Error> {
    match tools
        .iter()
        .find(|t| t.function_name() == call.function.name)
    {
        Some(tool) => tool.call(&call.function.arguments).await,
        None => {
            tracing::warn!("Model called unknown function {}", call.function.name);
            Ok(ToolFailure::UnknownFunction {
                name: call.function.name.clone(),
            }
            .to_value())
        }
    }
}
