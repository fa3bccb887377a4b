//! Conversation orchestrator - implements the tool-calling loop
//!
//! USER TEXT → MODEL TURN → {FINAL ANSWER | EXECUTE TOOLS → MODEL TURN → …}

use crate::bridge::{normalize, ToolService};
use crate::claude::ChatModel;
use crate::error::AgentError;
use crate::memory::ConversationStore;
use crate::models::{ContentBlock, ModelTurn, TextSegment, Turn};
use crate::Result;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

const MAX_TOOL_ROUNDS: u32 = 16;
const NO_TEXT_FALLBACK: &str = "(no text returned)";

/// Join a terminal model turn's text blocks into the reply delivered to
/// the user. Falls back to a placeholder when the turn carried no text.
fn collect_final_text(turn: &ModelTurn) -> String {
    let text = turn
        .content
        .iter()
        .filter_map(|block| match block {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n");

    let text = text.trim();
    if text.is_empty() {
        NO_TEXT_FALLBACK.to_string()
    } else {
        text.to_string()
    }
}

/// Drives one exchange per call: alternating model turns and tool rounds
/// until the model produces a final answer, then commits the exchange's
/// turns to the conversation store in one step.
pub struct ToolCallingLoop {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolService>,
    store: Arc<ConversationStore>,
    system_prompt: Option<String>,
}

impl ToolCallingLoop {
    pub fn new(
        model: Arc<dyn ChatModel>,
        tools: Arc<dyn ToolService>,
        store: Arc<ConversationStore>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            model,
            tools,
            store,
            system_prompt,
        }
    }

    /// Run one exchange for a conversation. Returns the final answer
    /// text; on error the stored history is left at its previous
    /// committed state.
    pub async fn run(&self, conversation_id: &str, user_text: &str) -> Result<String> {
        let start_time = Instant::now();

        info!(
            conversation_id = %conversation_id,
            chars = user_text.len(),
            "Exchange started"
        );

        // Schemas are refreshed once per exchange, not per round.
        let schemas = self.tools.list_tools().await?;
        debug!(tool_count = schemas.len(), "Tool schemas loaded");

        let mut history = self.store.history(conversation_id).await;
        let committed = history.len();
        history.push(Turn::user(user_text));

        let mut round: u32 = 0;
        let final_text = loop {
            // === MODEL ===
            let turn = self
                .model
                .complete(&history, &schemas, self.system_prompt.as_deref())
                .await?;

            debug!(
                round,
                stop_reason = %turn.stop_reason,
                block_count = turn.content.len(),
                "Model turn received"
            );

            history.push(Turn::assistant(turn.content.clone()));

            let requests: Vec<(&str, &str, &Value)> = turn
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => {
                        Some((id.as_str(), name.as_str(), input))
                    }
                    _ => None,
                })
                .collect();

            // A tool-use stop with zero requests terminates like any
            // other final turn.
            if !turn.requests_tools() || requests.is_empty() {
                break collect_final_text(&turn);
            }

            round += 1;
            if round > MAX_TOOL_ROUNDS {
                return Err(AgentError::ProtocolViolation(format!(
                    "exceeded {} tool rounds without a final answer",
                    MAX_TOOL_ROUNDS
                )));
            }

            // === EXECUTE ===
            let results = self.execute_round(&requests).await;

            // Every request id must come back as exactly one result
            // block, in emission order.
            let result_ids: Vec<&str> = results
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                    _ => None,
                })
                .collect();
            let request_ids: Vec<&str> = requests.iter().map(|(id, _, _)| *id).collect();
            if result_ids != request_ids {
                return Err(AgentError::ProtocolViolation(format!(
                    "tool round produced results {:?} for requests {:?}",
                    result_ids, request_ids
                )));
            }

            history.push(Turn::tool_results(results));
        };

        // === COMMIT ===
        let new_turns = history.split_off(committed);
        self.store.append(conversation_id, new_turns).await;

        info!(
            conversation_id = %conversation_id,
            rounds = round,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Exchange complete"
        );

        Ok(final_text)
    }

    /// Invoke each requested tool sequentially, in emission order.
    /// Failures become error-tagged result blocks; nothing here aborts
    /// the exchange.
    async fn execute_round(&self, requests: &[(&str, &str, &Value)]) -> Vec<ContentBlock> {
        let mut results = Vec::with_capacity(requests.len());

        for (id, name, input) in requests {
            let started = Instant::now();

            let block = match self.tools.invoke(name, input).await {
                Ok(raw) => {
                    debug!(
                        tool = %name,
                        request_id = %id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Tool invocation succeeded"
                    );
                    ContentBlock::ToolResult {
                        tool_use_id: id.to_string(),
                        content: normalize::to_segments(&raw),
                        is_error: false,
                    }
                }
                Err(e) => {
                    warn!(
                        tool = %name,
                        request_id = %id,
                        error = %e,
                        "Tool invocation failed"
                    );
                    ContentBlock::ToolResult {
                        tool_use_id: id.to_string(),
                        content: vec![TextSegment::text(format!("Tool error: {}", e))],
                        is_error: true,
                    }
                }
            };

            results.push(block);
        }

        results
    }
}
