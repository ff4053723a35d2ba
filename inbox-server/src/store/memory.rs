//! In-process message store, used when no broker is configured and in tests.
//!
//! The store is bounded: once `capacity` messages are held, each new one
//! evicts the oldest. Ids keep counting up across evictions.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::MessageSink;
use crate::queue::InboundMessage;

pub const DEFAULT_MEMORY_STORE_CAPACITY: usize = 10_000;

#[derive(Debug)]
pub struct MemoryStore {
    capacity: usize,
    inner: RwLock<StoreInner>,
}

#[derive(Debug, Default)]
struct StoreInner {
    next_id: u64,
    messages: VecDeque<(String, InboundMessage)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MEMORY_STORE_CAPACITY)
    }

    /// A store holding at most `capacity` messages (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(StoreInner::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn get(&self, id: &str) -> Option<InboundMessage> {
        self.inner
            .read()
            .await
            .messages
            .iter()
            .find(|(stored_id, _)| stored_id == id)
            .map(|(_, message)| message.clone())
    }

    /// Every retained message, oldest first.
    pub async fn messages(&self) -> Vec<InboundMessage> {
        self.inner
            .read()
            .await
            .messages
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageSink for MemoryStore {
    async fn store(&self, message: InboundMessage) -> anyhow::Result<String> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id.to_string();

        while inner.messages.len() >= self.capacity {
            if let Some((evicted, _)) = inner.messages.pop_front() {
                debug!(id = %evicted, capacity = self.capacity, "memory_store_evicted");
            }
        }

        info!(
            id = %id,
            alias_id = message.recipient_alias_id,
            message_id = %message.message_id,
            "memory_store_saved"
        );

        inner.messages.push_back((id.clone(), message));
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(subject: &str) -> InboundMessage {
        InboundMessage {
            recipient_alias_id: 1,
            alias_local_part: "river-ab12".to_string(),
            received_at: Utc::now(),
            message_id: format!("{}@example.com", subject),
            subject: subject.to_string(),
            from_address: "a@b.com".to_string(),
            preview_snippet: None,
            has_html_body: false,
            raw_body: String::new(),
            parsed: None,
        }
    }

    #[tokio::test]
    async fn test_store_assigns_sequential_ids() {
        let store = MemoryStore::new();
        assert_eq!(store.store(message("one")).await.unwrap(), "1");
        assert_eq!(store.store(message("two")).await.unwrap(), "2");
        assert_eq!(store.get("2").await.unwrap().subject, "two");
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_oldest_messages_are_evicted_at_capacity() {
        let store = MemoryStore::with_capacity(2);

        for subject in ["one", "two", "three"] {
            store.store(message(subject)).await.unwrap();
        }

        assert_eq!(store.len().await, 2);
        assert!(store.get("1").await.is_none());
        assert_eq!(store.get("3").await.unwrap().subject, "three");

        let subjects: Vec<_> = store.messages().await.into_iter().map(|m| m.subject).collect();
        assert_eq!(subjects, ["two", "three"]);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        assert_eq!(MemoryStore::with_capacity(0).capacity(), 1);
    }
}
