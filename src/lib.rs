//! Financial Chat Agent
//!
//! A tool-calling conversation agent that:
//! - Answers finance questions over a persistent per-conversation history
//! - Discovers tools from an MCP server and exposes them to the model
//! - Executes requested tool invocations sequentially, in emission order
//! - Normalizes arbitrary tool output into text the model can read
//! - Bounds retained history per conversation
//!
//! EXCHANGE LOOP:
//! USER TEXT → MODEL TURN → {FINAL ANSWER | EXECUTE TOOLS → MODEL TURN → …}

pub mod agent;
pub mod api;
pub mod bridge;
pub mod claude;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod prompts;

pub use error::{AgentError, Result};

// Re-export common types
pub use models::*;
