//! Disposable aliases: generation and an in-memory directory.

pub mod directory;
pub mod generator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use directory::AliasDirectory;
pub use generator::{sanitize_local_part, AliasGenerator};

/// A mailbox alias as seen by the ingestion pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alias {
    pub id: u64,
    /// Lowercase local part, unique across the directory
    pub local_part: String,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
}
