//! Conversation memory
//!
//! Process-lifetime storage of per-conversation history, bounded to a
//! configurable number of most-recent turns.

pub mod store;

pub use store::ConversationStore;
