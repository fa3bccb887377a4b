//! Environment-driven configuration.
//!
//! All environment access lives here; the rest of the crate receives
//! plain values. Binaries call `dotenv::dotenv().ok()` before loading.

use crate::error::{AgentError, Result};
use crate::prompts::DEFAULT_SYSTEM_PROMPT;
use std::env;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_MAX_TOKENS: u32 = 10_000;
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 20;

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub anthropic_api_key: String,
    pub mcp_server_url: String,
    /// Bare bearer token for the tool service, if any.
    pub mcp_auth_token: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    /// `None` disables the system instruction entirely.
    pub system_prompt: Option<String>,
    pub max_history_turns: usize,
}

impl AgentConfig {
    pub fn from_env() -> Result<Self> {
        let anthropic_api_key = require_var("ANTHROPIC_API_KEY")?;
        let mcp_server_url = require_var("MCP_SERVER_URL")?;
        let mcp_auth_token = normalize_auth_token(env::var("MCP_AUTH").ok().as_deref());

        let model = env::var("CLAUDE_MODEL")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let system_prompt = resolve_system_prompt(env::var("SYSTEM_PROMPT").ok().as_deref());

        let max_history_turns = env::var("MAX_HISTORY_TURNS")
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_MAX_HISTORY_TURNS);

        Ok(Self {
            anthropic_api_key,
            mcp_server_url,
            mcp_auth_token,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt,
            max_history_turns,
        })
    }
}

fn require_var(name: &str) -> Result<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AgentError::ConfigError(format!("{} is not set", name)))
}

/// The tool service expects a bare token. Accept either the token itself
/// or a full `Bearer <token>` header value; `oauth` selects the service's
/// own OAuth flow and passes through as-is.
pub fn normalize_auth_token(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() {
        return None;
    }
    if value.eq_ignore_ascii_case("oauth") {
        return Some("oauth".to_string());
    }
    let token = match value.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => value[7..].trim(),
        _ => value,
    };
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Unset falls back to the built-in prompt; set-but-blank disables the
/// system instruction; anything else replaces the built-in.
pub fn resolve_system_prompt(raw: Option<&str>) -> Option<String> {
    match raw {
        None => Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}
