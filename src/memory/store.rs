//! Conversation history storage
//!
//! In-memory map from conversation id to its ordered turns. Histories are
//! created lazily, read as snapshots, and mutated only through [`append`],
//! which trims each conversation to its most recent turns.
//!
//! [`append`]: ConversationStore::append

use crate::config::DEFAULT_MAX_HISTORY_TURNS;
use crate::models::Turn;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Bounded per-conversation turn storage.
///
/// The outer lock guards the key set; a per-conversation mutex serializes
/// turn mutation so concurrent exchanges on the same id cannot interleave
/// half-written history.
pub struct ConversationStore {
    max_turns: usize,
    histories: RwLock<HashMap<String, Arc<Mutex<VecDeque<Turn>>>>>,
}

impl ConversationStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            max_turns,
            histories: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Snapshot of a conversation's turns, oldest first. Empty for an
    /// unknown id; reading never creates an entry.
    pub async fn history(&self, conversation_id: &str) -> Vec<Turn> {
        let handle = {
            let locked = self.histories.read().await;
            match locked.get(conversation_id) {
                Some(handle) => handle.clone(),
                None => return Vec::new(),
            }
        };

        let turns = handle.lock().await;
        turns.iter().cloned().collect()
    }

    /// Commit a completed exchange: append its new turns and trim the
    /// conversation to the most recent `max_turns`. This is the only
    /// mutation point, so an exchange abandoned before commit leaves
    /// stored history untouched.
    pub async fn append(&self, conversation_id: &str, new_turns: Vec<Turn>) {
        let handle = self.handle(conversation_id).await;
        let mut turns = handle.lock().await;

        turns.extend(new_turns);
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    /// Number of turns currently retained for a conversation.
    pub async fn turn_count(&self, conversation_id: &str) -> usize {
        let locked = self.histories.read().await;
        match locked.get(conversation_id) {
            Some(handle) => handle.lock().await.len(),
            None => 0,
        }
    }

    /// Number of conversations with at least one committed exchange.
    pub async fn conversation_count(&self) -> usize {
        self.histories.read().await.len()
    }

    async fn handle(&self, conversation_id: &str) -> Arc<Mutex<VecDeque<Turn>>> {
        {
            let locked = self.histories.read().await;
            if let Some(handle) = locked.get(conversation_id) {
                return handle.clone();
            }
        }

        let mut locked = self.histories.write().await;
        locked
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(VecDeque::new())))
            .clone()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY_TURNS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentBlock, Turn};

    fn exchange(i: usize) -> Vec<Turn> {
        vec![
            Turn::user(format!("Question {}", i)),
            Turn::assistant(vec![ContentBlock::Text {
                text: format!("Answer {}", i),
            }]),
        ]
    }

    #[test]
    fn test_default_capacity() {
        let store = ConversationStore::default();
        assert_eq!(store.max_turns(), 20);

        tokio_test::block_on(store.append("c1", exchange(0)));
        assert_eq!(tokio_test::block_on(store.turn_count("c1")), 2);
    }

    #[tokio::test]
    async fn test_unknown_conversation_reads_empty() {
        let store = ConversationStore::new(20);

        assert!(store.history("nope").await.is_empty());
        assert_eq!(store.turn_count("nope").await, 0);
        // reads must not allocate entries
        assert_eq!(store.conversation_count().await, 0);
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let store = ConversationStore::new(20);

        store.append("chat-1", exchange(0)).await;
        store.append("chat-1", exchange(1)).await;

        let turns = store.history("chat-1").await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].text().unwrap(), "Question 0");
        assert_eq!(turns[2].text().unwrap(), "Question 1");
    }

    #[tokio::test]
    async fn test_conversations_are_independent() {
        let store = ConversationStore::new(20);

        store.append("alice", exchange(0)).await;
        store.append("bob", exchange(1)).await;

        assert_eq!(store.turn_count("alice").await, 2);
        assert_eq!(store.turn_count("bob").await, 2);
        assert_eq!(store.conversation_count().await, 2);
        assert_eq!(store.history("alice").await[0].text().unwrap(), "Question 0");
    }

    #[tokio::test]
    async fn test_trims_to_most_recent_turns() {
        let store = ConversationStore::new(20);

        for i in 0..25 {
            store.append("chat-1", exchange(i)).await;
        }

        let turns = store.history("chat-1").await;
        assert_eq!(turns.len(), 20);
        // 50 turns written, the oldest 30 dropped
        assert_eq!(turns[0].text().unwrap(), "Question 15");
        assert_eq!(turns[18].text().unwrap(), "Question 24");
    }

    #[tokio::test]
    async fn test_oversized_exchange_is_trimmed_on_commit() {
        let store = ConversationStore::new(4);

        let big: Vec<Turn> = (0..6).flat_map(exchange).collect();
        store.append("chat-1", big).await;

        let turns = store.history("chat-1").await;
        assert_eq!(turns.len(), 4);
        assert_eq!(turns[0].text().unwrap(), "Question 4");
    }

    #[tokio::test]
    async fn test_snapshot_is_detached_from_store() {
        let store = ConversationStore::new(20);
        store.append("chat-1", exchange(0)).await;

        let mut snapshot = store.history("chat-1").await;
        snapshot.push(Turn::user("local only"));

        assert_eq!(store.turn_count("chat-1").await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_do_not_lose_turns() {
        let store = Arc::new(ConversationStore::new(100));

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..10 {
                    store.append("shared", exchange(i)).await;
                }
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 10..20 {
                    store.append("shared", exchange(i)).await;
                }
            })
        };

        a.await.unwrap();
        b.await.unwrap();

        assert_eq!(store.turn_count("shared").await, 40);
    }
}
