//! Collaborator interfaces for alias lookup and message persistence.
//!
//! The pipeline only depends on these traits. `AliasDirectory` and
//! `MemoryStore` are in-process implementations; the RabbitMQ `Publisher`
//! is the production message sink.

pub mod memory;

use async_trait::async_trait;

use crate::alias::{Alias, AliasDirectory};
use crate::queue::InboundMessage;

pub use memory::MemoryStore;

/// Resolves recipients to aliases.
#[async_trait]
pub trait AliasLookup: Send + Sync {
    /// Find an enabled alias by its lowercase local part.
    async fn find_enabled_by_local_part(&self, local_part: &str) -> anyhow::Result<Option<Alias>>;
}

/// Accepts ingested messages for persistence.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Persist a message, returning the identifier it was stored under.
    async fn store(&self, message: InboundMessage) -> anyhow::Result<String>;
}

#[async_trait]
impl AliasLookup for AliasDirectory {
    async fn find_enabled_by_local_part(&self, local_part: &str) -> anyhow::Result<Option<Alias>> {
        Ok(self.get(local_part).await.filter(|alias| alias.enabled))
    }
}
