//! Error types for the financial chat agent

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Startup / Configuration
    // =============================

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // Conversation Loop Errors
    // =============================

    #[error("Model request error: {0}")]
    ModelError(String),

    #[error("Tool service error: {0}")]
    BridgeError(String),

    #[error("Tool '{name}' failed: {cause}")]
    ToolFailed { name: String, cause: String },

    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
