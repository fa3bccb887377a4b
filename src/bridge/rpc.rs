//! JSON-RPC 2.0 client for the tool execution service.
//!
//! Speaks the MCP wire protocol over HTTP: `initialize` handshake,
//! `tools/list`, `tools/call`. Raw results are returned verbatim;
//! schema mapping and result normalization live one layer up.

use crate::error::{AgentError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

const CLIENT_NAME: &str = "financial-chat-agent";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// JSON-RPC 2.0 request
#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: u64,
    method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

/// JSON-RPC 2.0 response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: Option<u64>,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object
#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[allow(dead_code)]
    data: Option<Value>,
}

impl JsonRpcResponse {
    /// Unwrap `result`, rendering the error object when absent.
    fn into_result(self, method: &str) -> Result<Value> {
        if let Some(error) = self.error {
            return Err(AgentError::BridgeError(format!(
                "{} failed: [{}] {}",
                method, error.code, error.message
            )));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// HTTP client for one MCP endpoint.
pub struct McpClient {
    client: reqwest::Client,
    endpoint: String,
    auth_token: Option<String>,
    request_id: AtomicU64,
}

impl McpClient {
    pub fn new(endpoint: &str, auth_token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_token: auth_token.map(|t| t.to_string()),
            request_id: AtomicU64::new(1),
        })
    }

    /// MCP initialization handshake: `initialize`, then the
    /// `notifications/initialized` notification. Returns the server's
    /// initialize result (capabilities, serverInfo).
    pub async fn initialize(&self) -> Result<Value> {
        let params = json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": CLIENT_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            }
        });

        let response = self.send_request("initialize", Some(params)).await?;
        let result = response.into_result("initialize")?;

        // Notifications carry no id and expect no response body.
        let _ = self.send_notification("notifications/initialized").await;

        Ok(result)
    }

    /// Raw tool descriptors from `tools/list` (`result.tools`).
    pub async fn list_tools(&self) -> Result<Vec<Value>> {
        let response = self.send_request("tools/list", None).await?;
        let result = response.into_result("tools/list")?;

        Ok(result
            .get("tools")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// Invoke a tool via `tools/call`, returning the raw result verbatim.
    pub async fn call_tool(&self, name: &str, arguments: &Value) -> Result<Value> {
        let params = json!({
            "name": name,
            "arguments": arguments,
        });

        let response = self.send_request("tools/call", Some(params)).await?;
        response.into_result(&format!("tools/call '{}'", name))
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id,
            method: method.to_string(),
            params,
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.auth_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        let response = builder.json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AgentError::BridgeError(format!(
                "tool service returned HTTP {} for {}: {}",
                status, method, body
            )));
        }

        let text = response.text().await?;
        Ok(serde_json::from_str::<JsonRpcResponse>(&text)?)
    }

    async fn send_notification(&self, method: &str) -> Result<()> {
        let notification = json!({
            "jsonrpc": "2.0",
            "method": method,
        });

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json");
        if let Some(token) = &self.auth_token {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        builder.json(&notification).send().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serialization_omits_absent_params() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: 1,
            method: "tools/list".to_string(),
            params: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["jsonrpc"], "2.0");
        assert_eq!(parsed["id"], 1);
        assert_eq!(parsed["method"], "tools/list");
        assert!(parsed.get("params").is_none());
    }

    #[test]
    fn test_request_serialization_with_params() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: 7,
            method: "tools/call".to_string(),
            params: Some(json!({
                "name": "quote",
                "arguments": {"symbols": ["BTC/USDT"]}
            })),
        };

        let json = serde_json::to_string(&request).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["params"]["name"], "quote");
        assert_eq!(parsed["params"]["arguments"]["symbols"][0], "BTC/USDT");
    }

    #[test]
    fn test_response_success_parse() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "result": {"tools": [{"name": "quote", "description": "Spot quotes"}]}
        }"#;

        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let result = response.into_result("tools/list").unwrap();
        assert_eq!(result["tools"][0]["name"], "quote");
    }

    #[test]
    fn test_response_error_becomes_err() {
        let json = r#"{
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "Method not found"}
        }"#;

        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        let err = response.into_result("tools/list").unwrap_err();
        let rendered = err.to_string();
        assert!(rendered.contains("-32601"), "unexpected error: {}", rendered);
        assert!(rendered.contains("Method not found"));
    }

    #[test]
    fn test_response_null_result_maps_to_null() {
        let json = r#"{"jsonrpc": "2.0", "id": 3}"#;
        let response: JsonRpcResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.into_result("tools/call").unwrap(), Value::Null);
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let client = McpClient::new("http://localhost:9000/mcp/", None).unwrap();
        assert_eq!(client.endpoint, "http://localhost:9000/mcp");
    }
}
