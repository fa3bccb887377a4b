//! Anthropic messages client.
//!
//! Implements the `ChatModel` trait against the messages API. Request
//! bodies are built as JSON values; responses are parsed into private
//! wire structs and mapped onto the crate's domain types.

use crate::error::{AgentError, Result};
use crate::models::{ContentBlock, ModelTurn, StopReason, ToolSchema, Turn};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const MODEL_REQUEST_TIMEOUT_SECS: u64 = 120;

/// Interface the conversation loop requests model turns through.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// One model round: full history plus the current tool schemas.
    async fn complete(
        &self,
        history: &[Turn],
        tools: &[ToolSchema],
        system: Option<&str>,
    ) -> Result<ModelTurn>;
}

pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn new(api_key: String, model: String, max_tokens: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(MODEL_REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: ANTHROPIC_API_URL.to_string(),
            model,
            max_tokens,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(
        &self,
        history: &[Turn],
        tools: &[ToolSchema],
        system: Option<&str>,
    ) -> Value {
        let messages: Vec<Value> = history.iter().map(turn_to_message).collect();

        let mut body = json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "messages": messages,
        });

        if !tools.is_empty() {
            body["tools"] = json!(tools);
            // one request at a time keeps result ordering deterministic
            body["tool_choice"] = json!({
                "type": "auto",
                "disable_parallel_tool_use": true,
            });
        }

        if let Some(sys) = system.filter(|s| !s.is_empty()) {
            body["system"] = json!(sys);
        }

        body
    }
}

/// Roles on the wire are only `user`/`assistant`; tool-result turns are
/// sent with role `user` and their blocks as content.
fn turn_to_message(turn: &Turn) -> Value {
    json!({
        "role": turn.role.wire_name(),
        "content": turn.content,
    })
}

#[async_trait]
impl ChatModel for AnthropicClient {
    async fn complete(
        &self,
        history: &[Turn],
        tools: &[ToolSchema],
        system: Option<&str>,
    ) -> Result<ModelTurn> {
        let body = self.build_request_body(history, tools, system);

        let response = self
            .client
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let body_text = response.text().await?;
        if !status.is_success() {
            return Err(AgentError::ModelError(format!(
                "model service returned HTTP {}: {}",
                status, body_text
            )));
        }

        let parsed: MessagesResponse = serde_json::from_str(&body_text)
            .map_err(|e| AgentError::ModelError(format!("failed to parse model response: {}", e)))?;

        debug!(
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            stop_reason = ?parsed.stop_reason,
            "Model turn received"
        );

        Ok(parse_turn(parsed))
    }
}

fn parse_turn(response: MessagesResponse) -> ModelTurn {
    let content = response
        .content
        .into_iter()
        .map(|block| match block {
            WireBlock::Text { text } => ContentBlock::Text { text },
            WireBlock::ToolUse { id, name, input } => ContentBlock::ToolUse { id, name, input },
        })
        .collect();

    let stop_reason = match response.stop_reason.as_deref() {
        Some("end_turn") => StopReason::EndTurn,
        Some("max_tokens") => StopReason::MaxTokens,
        Some("stop_sequence") => StopReason::StopSequence,
        Some("tool_use") => StopReason::ToolUse,
        Some(_) => StopReason::Other,
        None => StopReason::EndTurn,
    };

    ModelTurn {
        content,
        stop_reason,
    }
}

/// Messages API response format
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<WireBlock>,
    #[allow(dead_code)]
    model: String,
    stop_reason: Option<String>,
    usage: WireUsage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    input_tokens: u32,
    output_tokens: u32,
}
