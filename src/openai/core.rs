use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use erased_serde;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum Role {
    #[serde(rename = "system")]
    System,
    #[serde(rename = "assistant")]
    Assistant,
    #[serde(rename = "user")]
    User,
    #[serde(rename = "tool")]
    Tool,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FunctionCallFn {
    pub arguments: String,
    pub name: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct FunctionCall {
    pub function: FunctionCallFn,
    pub id: String,
    pub r#type: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<FunctionCall>>,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: Some(content.to_string()),
            tool_call_id: None,
            tool_calls: None,
        }
    }
    pub fn new_tool_call_request(tool_calls: Vec<FunctionCall>) -> Self {
        Message {
            role: Role::Assistant,
            content: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }
    pub fn new_tool_call_response(content: &str, tool_call_id: &str) -> Self {
        Message {
            role: Role::Tool,
            content: Some(content.to_string()),
            tool_call_id: Some(tool_call_id.to_string()),
            tool_calls: None,
        }
    }
}

#[derive(Serialize)]
pub struct Property {
    pub r#type: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r#enum: Option<Vec<String>>,
}

impl Property {
    pub fn new(kind: &str, description: &str) -> Self {
        Property {
            r#type: kind.to_string(),
            description: description.to_string(),
            r#enum: None,
        }
    }
}

#[derive(Serialize)]
pub struct Parameters<Props: Serialize> {
    pub r#type: String,
    pub properties: Props,
    pub required: Vec<String>,
    #[serde(rename = "additionalProperties")]
    pub additional_properties: bool,
}

#[derive(Serialize)]
pub struct Function<Props: Serialize> {
    pub name: String,
    pub description: String,
    pub parameters: Parameters<Props>,
    pub strict: bool,
}

#[derive(Serialize)]
pub enum ToolType {
    #[serde(rename = "function")]
    Function,
}

// Tools are held as trait objects but still need to serialize into
// the request payload, hence `erased_serde`.
#[async_trait]
pub trait ToolCall: erased_serde::Serialize {
    /// Run the operation with the model's JSON arguments. Input
    /// problems are reported inside the returned value, `Err` is
    /// reserved for collaborator failures.
    async fn call(&self, args: &str) -> Result<Value, Error>;
    fn function_name(&self) -> String;
}
erased_serde::serialize_trait_object!(ToolCall);

pub type BoxedToolCall = Box<dyn ToolCall + Send + Sync + 'static>;

pub async fn completion(
    messages: &[Message],
    tools: &Option<Vec<BoxedToolCall>>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<Value, Error> {
    let mut payload = json!({
        "model": model,
        "messages": messages,
    });
    if let Some(tools) = tools {
        payload["tools"] = json!(tools);
        payload["parallel_tool_calls"] = json!(false);
    }
    let url = format!("{}/v1/chat/completions", api_hostname.trim_end_matches("/"));
    let response = reqwest::Client::new()
        .post(url)
        .bearer_auth(api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60))
        .json(&payload)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response)
}

/// What the model chose to do with its turn.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply {
    Text(String),
    ToolCalls(Vec<FunctionCall>),
}

/// Read the first choice of a chat completion response.
pub fn parse_reply(response: &Value) -> Result<ModelReply, Error> {
    if let Some(err) = response.get("error") {
        return Err(anyhow!("Model returned an error: {}", err));
    }
    let message = response
        .pointer("/choices/0/message")
        .ok_or_else(|| anyhow!("Completion response missing a message: {}", response))?;

    if let Some(calls) = message.get("tool_calls").filter(|c| !c.is_null()) {
        let calls: Vec<FunctionCall> = serde_json::from_value(calls.clone())?;
        if !calls.is_empty() {
            return Ok(ModelReply::ToolCalls(calls));
        }
    }

    let content = message
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Ok(ModelReply::Text(content.to_string()))
}

/// A chat model that may answer with text or request a tool call.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &Option<Vec<BoxedToolCall>>,
    ) -> Result<Value, Error>;
}

/// Any OpenAI compatible chat completions endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiClient {
    api_hostname: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(api_hostname: &str, api_key: &str, model: &str) -> Self {
        Self {
            api_hostname: api_hostname.to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &Option<Vec<BoxedToolCall>>,
    ) -> Result<Value, Error> {
        completion(messages, tools, &self.api_hostname, &self.api_key, &self.model).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::System).unwrap(), r#""system""#);
        assert_eq!(serde_json::to_string(&Role::Tool).unwrap(), r#""tool""#);
        assert_eq!(serde_json::from_str::<Role>(r#""assistant""#).unwrap(), Role::Assistant);
    }

    #[test]
    fn test_message_new() {
        let msg = Message::new(Role::User, "明日の予定は？");
        assert_eq!(
            serde_json::to_string(&msg).unwrap(),
            r#"{"role":"user","content":"明日の予定は？"}"#
        );
    }

    #[test]
    fn test_message_tool_call_round() {
        let call = FunctionCall {
            function: FunctionCallFn {
                arguments: r#"{"date":"2025-01-30"}"#.to_string(),
                name: "search_events".to_string(),
            },
            id: "call_1".to_string(),
            r#type: "function".to_string(),
        };
        let request = Message::new_tool_call_request(vec![call]);
        assert_eq!(
            serde_json::to_string(&request).unwrap(),
            r#"{"role":"assistant","tool_calls":[{"function":{"arguments":"{\"date\":\"2025-01-30\"}","name":"search_events"},"id":"call_1","type":"function"}]}"#
        );

        let response = Message::new_tool_call_response(r#"{"count":0}"#, "call_1");
        assert_eq!(
            serde_json::to_string(&response).unwrap(),
            r#"{"role":"tool","content":"{\"count\":0}","tool_call_id":"call_1"}"#
        );
    }

    #[test]
    fn test_property_enum_serialization() {
        let mut prop = Property::new("string", "Plan to upgrade to");
        assert_eq!(
            serde_json::to_value(&prop).unwrap(),
            json!({"type": "string", "description": "Plan to upgrade to"})
        );
        prop.r#enum = Some(vec![String::from("basic"), String::from("premium")]);
        assert_eq!(
            serde_json::to_value(&prop).unwrap()["enum"],
            json!(["basic", "premium"])
        );
    }

    #[test]
    fn test_parse_reply_text() {
        let resp = json!({"choices": [{"message": {"role": "assistant", "content": "こんにちは"}}]});
        assert_eq!(
            parse_reply(&resp).unwrap(),
            ModelReply::Text(String::from("こんにちは"))
        );
    }

    #[test]
    fn test_parse_reply_tool_calls() {
        let resp = json!({"choices": [{"message": {
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": {"name": "check_subscription", "arguments": "{}"}
            }]
        }}]});
        match parse_reply(&resp).unwrap() {
            ModelReply::ToolCalls(calls) => {
                assert_eq!(calls.len(), 1);
                assert_eq!(calls[0].function.name, "check_subscription");
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }

    #[test]
    fn test_parse_reply_error() {
        assert!(parse_reply(&json!({"error": {"message": "bad key"}})).is_err());
        assert!(parse_reply(&json!({"choices": []})).is_err());
    }

    #[tokio::test]
    async fn test_completion_basic() {
        let mut server = mockito::Server::new_async().await;

        let response_body = r#"{
            "id": "chatcmpl-123",
            "object": "chat.completion",
            "model": "gpt-4o-mini",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }]
        }"#;

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer test-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(response_body)
            .create_async()
            .await;

        let client = OpenAiClient::new(&server.url(), "test-key", "gpt-4o-mini");
        let messages = vec![Message::new(Role::User, "Hi")];
        let result = client.complete(&messages, &None).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result["choices"][0]["message"]["content"], "Hello!");
    }

    #[tokio::test]
    async fn test_completion_with_tools_disables_parallel_calls() {
        let mut server = mockito::Server::new_async().await;

        #[derive(serde::Serialize)]
        struct MockTool;
        #[async_trait]
        impl ToolCall for MockTool {
            async fn call(&self, _args: &str) -> Result<Value, Error> {
                Ok(json!({"ok": true}))
            }
            fn function_name(&self) -> String {
                "mock".to_string()
            }
        }

        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(mockito::Matcher::PartialJson(json!({"parallel_tool_calls": false})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"ok"}}]}"#)
            .create_async()
            .await;

        let tools = Some(vec![Box::new(MockTool) as BoxedToolCall]);
        let messages = vec![Message::new(Role::User, "Hi")];
        let result = completion(&messages, &tools, &server.url(), "test-key", "gpt-4o-mini").await;

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_completion_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(500)
            .create_async()
            .await;

        let messages = vec![Message::new(Role::User, "Hi")];
        let result = completion(&messages, &None, &server.url(), "test-key", "gpt-4o-mini").await;
        assert!(result.is_err());
    }
}
