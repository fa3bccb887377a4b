//! REST API server for the financial chat agent
//!
//! Exposes the tool-calling loop over HTTP for frontend integration

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{error, info};
use uuid::Uuid;

use crate::agent::ToolCallingLoop;
use crate::bridge::ToolBridge;
use crate::memory::ConversationStore;

/// =============================
/// Request Models
/// =============================

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub conversation_id: Option<String>,
}

/// =============================
/// Response Wrapper
/// =============================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub timestamp: String,
}

impl ApiResponse {
    pub fn success<T: Serialize>(data: T) -> Self {
        Self {
            success: true,
            data: serde_json::to_value(data).ok(),
            error: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// =============================
/// API State
/// =============================

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<ToolCallingLoop>,
    pub tools: Arc<ToolBridge>,
    pub store: Arc<ConversationStore>,
}

/// =============================
/// Helpers
/// =============================

/// Callers without a conversation id get a fresh one, echoed back in the
/// response so follow-up messages can continue the thread.
fn resolve_conversation_id(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => Uuid::new_v4().to_string(),
    }
}

/// =============================
/// Health Endpoint
/// =============================

async fn health(State(state): State<ApiState>) -> Json<ApiResponse> {
    let active = state.store.conversation_count().await;

    Json(ApiResponse::success(serde_json::json!({
        "status": "ok",
        "active_conversations": active,
    })))
}

/// =============================
/// Chat Endpoint
/// =============================

async fn chat_handler(
    State(state): State<ApiState>,
    Json(req): Json<ChatRequest>,
) -> (StatusCode, Json<ApiResponse>) {
    if req.message.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::error("No message provided".into())),
        );
    }

    let conversation_id = resolve_conversation_id(req.conversation_id.as_deref());
    info!(conversation_id = %conversation_id, "Received chat request");

    match state.agent.run(&conversation_id, &req.message).await {
        Ok(reply) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "reply": reply,
                "conversation_id": conversation_id,
            }))),
        ),
        Err(e) => {
            error!(conversation_id = %conversation_id, error = %e, "Exchange failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(
                    "Sorry, something went wrong processing your message.".into(),
                )),
            )
        }
    }
}

/// =============================
/// Tools Endpoint
/// =============================

async fn tools_handler(State(state): State<ApiState>) -> (StatusCode, Json<ApiResponse>) {
    match state.tools.tools().await {
        Ok(schemas) => (
            StatusCode::OK,
            Json(ApiResponse::success(serde_json::json!({
                "count": schemas.len(),
                "tools": schemas,
            }))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Tool listing failed: {}", e))),
        ),
    }
}

/// =============================
/// Router
/// =============================

pub fn create_router(
    agent: Arc<ToolCallingLoop>,
    tools: Arc<ToolBridge>,
    store: Arc<ConversationStore>,
) -> Router {
    let state = ApiState {
        agent,
        tools,
        store,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat_handler))
        .route("/api/tools", get(tools_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// =============================
/// Server Startup
/// =============================

pub async fn start_server(
    agent: Arc<ToolCallingLoop>,
    tools: Arc<ToolBridge>,
    store: Arc<ConversationStore>,
    port: u16,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let router = create_router(agent, tools, store);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    info!("API Server listening on http://0.0.0.0:{}", port);
    info!("Local: http://127.0.0.1:{}", port);

    axum::serve(listener, router).await?;

    Ok(())
}
