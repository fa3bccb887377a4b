//! Bridge to the external tool execution service.
//!
//! Owns the connection lifecycle, composes the schema catalog and result
//! normalization, and converts remote failures into per-tool errors the
//! conversation loop folds back into history instead of raising.

pub mod catalog;
pub mod normalize;
pub mod rpc;

use crate::error::{AgentError, Result};
use crate::models::ToolSchema;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

use catalog::ToolCatalog;
use rpc::McpClient;

/// Upper bound on a single tool invocation.
pub const TOOL_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Interface the conversation loop drives tools through.
#[async_trait]
pub trait ToolService: Send + Sync {
    /// Current model-facing tool schemas, freshly fetched.
    async fn list_tools(&self) -> Result<Vec<ToolSchema>>;

    /// Invoke a named tool, returning the raw result verbatim.
    /// Failures carry the tool name so they can be folded into history.
    async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value>;
}

pub struct ToolBridge {
    client: McpClient,
    catalog: ToolCatalog,
    connected: AtomicBool,
    // serializes connect/close so the handshake runs at most once
    lifecycle: Mutex<()>,
    call_timeout: Duration,
}

impl ToolBridge {
    pub fn new(endpoint: &str, auth_token: Option<&str>) -> Result<Self> {
        Ok(Self {
            client: McpClient::new(endpoint, auth_token)?,
            catalog: ToolCatalog::new(),
            connected: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            call_timeout: TOOL_CALL_TIMEOUT,
        })
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Handshake with the tool service. Connecting twice is a no-op.
    pub async fn connect(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if self.connected.load(Ordering::SeqCst) {
            return Ok(());
        }

        let init = self.client.initialize().await?;
        self.connected.store(true, Ordering::SeqCst);

        let server_name = init
            .get("serverInfo")
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        info!(server = %server_name, "Connected to tool service");
        Ok(())
    }

    /// Release the session. Closing while not connected is a no-op.
    pub async fn close(&self) -> Result<()> {
        let _guard = self.lifecycle.lock().await;
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.catalog.clear().await;
        debug!("Tool service connection closed");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Cached schemas if present, otherwise a refresh.
    pub async fn tools(&self) -> Result<Vec<ToolSchema>> {
        if let Some(cached) = self.catalog.snapshot().await {
            return Ok(cached);
        }
        self.refresh_tools().await
    }

    /// Re-fetch descriptors and rebuild the catalog snapshot.
    pub async fn refresh_tools(&self) -> Result<Vec<ToolSchema>> {
        self.ensure_connected()?;
        let descriptors = self.client.list_tools().await?;
        let schemas = self.catalog.refresh_from(&descriptors).await;
        debug!(count = schemas.len(), "Tool catalog refreshed");
        Ok(schemas)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(AgentError::BridgeError(
                "tool service is not connected".to_string(),
            ))
        }
    }
}

#[async_trait]
impl ToolService for ToolBridge {
    async fn list_tools(&self) -> Result<Vec<ToolSchema>> {
        self.refresh_tools().await
    }

    async fn invoke(&self, name: &str, arguments: &Value) -> Result<Value> {
        if !self.is_connected() {
            return Err(AgentError::ToolFailed {
                name: name.to_string(),
                cause: "tool service is not connected".to_string(),
            });
        }

        debug!(tool = %name, arguments = %arguments, "Invoking tool");
        match tokio::time::timeout(self.call_timeout, self.client.call_tool(name, arguments)).await
        {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) => Err(AgentError::ToolFailed {
                name: name.to_string(),
                cause: e.to_string(),
            }),
            Err(_) => Err(AgentError::ToolFailed {
                name: name.to_string(),
                cause: format!("timed out after {}s", self.call_timeout.as_secs()),
            }),
        }
    }
}

/// First field from `keys` present on `value` with a usable payload.
/// Null and empty strings/arrays/objects do not count as present.
pub(crate) fn first_present<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find(|candidate| is_present(candidate))
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Json, Router};
    use serde_json::json;
    use std::sync::atomic::AtomicU64;
    use std::sync::Arc;

    #[test]
    fn test_first_present_priority_order() {
        let value = json!({"a": null, "b": "", "c": "hit", "d": "later"});
        let found = first_present(&value, &["a", "b", "c", "d"]).unwrap();
        assert_eq!(found, &json!("hit"));
    }

    #[test]
    fn test_first_present_none_when_all_empty() {
        let value = json!({"a": null, "b": {}, "c": []});
        assert!(first_present(&value, &["a", "b", "c"]).is_none());
        assert!(first_present(&json!("not an object"), &["a"]).is_none());
    }

    #[test]
    fn test_zero_and_false_count_as_present() {
        let value = json!({"n": 0, "f": false});
        assert_eq!(first_present(&value, &["n"]).unwrap(), &json!(0));
        assert_eq!(first_present(&value, &["f"]).unwrap(), &json!(false));
    }

    #[derive(Default)]
    struct ServerStats {
        initialize_calls: AtomicU64,
        tool_calls: AtomicU64,
    }

    fn handle_rpc(body: &Value, stats: &ServerStats) -> Value {
        let method = body.get("method").and_then(Value::as_str).unwrap_or("");
        let id = body.get("id").cloned().unwrap_or(Value::Null);

        match method {
            "initialize" => {
                stats.initialize_calls.fetch_add(1, Ordering::SeqCst);
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "result": {
                        "protocolVersion": rpc::MCP_PROTOCOL_VERSION,
                        "capabilities": {"tools": {}},
                        "serverInfo": {"name": "mock-finance-tools", "version": "0.1.0"}
                    }
                })
            }
            "notifications/initialized" => json!({"jsonrpc": "2.0", "id": null, "result": {}}),
            "tools/list" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "tools": [
                        {
                            "name": "quote",
                            "description": "Spot quotes and 24h change",
                            "inputSchema": {
                                "type": "object",
                                "properties": {"symbols": {"type": "array"}}
                            }
                        },
                        {"description": "nameless descriptor, must be skipped"}
                    ]
                }
            }),
            "tools/call" => {
                stats.tool_calls.fetch_add(1, Ordering::SeqCst);
                let name = body
                    .get("params")
                    .and_then(|p| p.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("");
                if name == "quote" {
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "result": {
                            "content": [{"type": "text", "text": "BTC/USDT: 65000, +1.2%"}]
                        }
                    })
                } else {
                    json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32000, "message": "unknown tool"}
                    })
                }
            }
            _ => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": {"code": -32601, "message": "Method not found"}
            }),
        }
    }

    async fn spawn_mock_server(stats: Arc<ServerStats>) -> String {
        let app = Router::new().route(
            "/",
            post(move |Json(body): Json<Value>| {
                let stats = stats.clone();
                async move { Json(handle_rpc(&body, &stats)) }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let stats = Arc::new(ServerStats::default());
        let url = spawn_mock_server(stats.clone()).await;

        let bridge = ToolBridge::new(&url, None).unwrap();
        bridge.connect().await.unwrap();
        bridge.connect().await.unwrap();

        assert!(bridge.is_connected());
        assert_eq!(stats.initialize_calls.load(Ordering::SeqCst), 1);

        bridge.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_without_connect_is_noop() {
        let bridge = ToolBridge::new("http://127.0.0.1:1", None).unwrap();
        bridge.close().await.unwrap();
        assert!(!bridge.is_connected());
    }

    #[tokio::test]
    async fn test_reconnect_after_close() {
        let stats = Arc::new(ServerStats::default());
        let url = spawn_mock_server(stats.clone()).await;

        let bridge = ToolBridge::new(&url, None).unwrap();
        bridge.connect().await.unwrap();
        bridge.close().await.unwrap();
        assert!(!bridge.is_connected());

        bridge.connect().await.unwrap();
        assert!(bridge.is_connected());
        assert_eq!(stats.initialize_calls.load(Ordering::SeqCst), 2);

        bridge.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_tools_maps_and_skips_nameless() {
        let stats = Arc::new(ServerStats::default());
        let url = spawn_mock_server(stats).await;

        let bridge = ToolBridge::new(&url, None).unwrap();
        bridge.connect().await.unwrap();

        let tools = bridge.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "quote");
        assert_eq!(tools[0].input_schema["type"], "object");

        // the snapshot is served from cache without another fetch
        let cached = bridge.tools().await.unwrap();
        assert_eq!(cached, tools);

        bridge.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_returns_raw_result() {
        let stats = Arc::new(ServerStats::default());
        let url = spawn_mock_server(stats.clone()).await;

        let bridge = ToolBridge::new(&url, None).unwrap();
        bridge.connect().await.unwrap();

        let raw = bridge
            .invoke("quote", &json!({"symbols": ["BTC/USDT"]}))
            .await
            .unwrap();
        assert_eq!(raw["content"][0]["text"], "BTC/USDT: 65000, +1.2%");
        assert_eq!(stats.tool_calls.load(Ordering::SeqCst), 1);

        bridge.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_rpc_error_becomes_tool_failed() {
        let stats = Arc::new(ServerStats::default());
        let url = spawn_mock_server(stats).await;

        let bridge = ToolBridge::new(&url, None).unwrap();
        bridge.connect().await.unwrap();

        let err = bridge.invoke("nope", &json!({})).await.unwrap_err();
        match err {
            AgentError::ToolFailed { name, cause } => {
                assert_eq!(name, "nope");
                assert!(cause.contains("unknown tool"), "cause: {}", cause);
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }

        bridge.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_invoke_before_connect_fails_with_tool_error() {
        let bridge = ToolBridge::new("http://127.0.0.1:1", None).unwrap();
        let err = bridge.invoke("quote", &json!({})).await.unwrap_err();
        assert!(matches!(err, AgentError::ToolFailed { .. }));
    }

    #[tokio::test]
    async fn test_invoke_timeout_becomes_tool_failed() {
        // a server that accepts connections but never answers tools/call
        let app = Router::new().route(
            "/",
            post(|Json(body): Json<Value>| async move {
                let method = body.get("method").and_then(Value::as_str).unwrap_or("");
                if method == "tools/call" {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
                Json(handle_rpc(&body, &ServerStats::default()))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let bridge = ToolBridge::new(&format!("http://{}", addr), None)
            .unwrap()
            .with_call_timeout(Duration::from_millis(100));
        bridge.connect().await.unwrap();

        let err = bridge.invoke("quote", &json!({})).await.unwrap_err();
        match err {
            AgentError::ToolFailed { cause, .. } => {
                assert!(cause.contains("timed out"), "cause: {}", cause);
            }
            other => panic!("expected ToolFailed, got {:?}", other),
        }

        bridge.close().await.unwrap();
    }
}
