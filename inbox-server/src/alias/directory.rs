//! In-memory alias directory.
//!
//! Uniqueness of local parts is enforced here, under the write lock, so
//! concurrent provisioning can never hand out the same alias twice.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::info;

use super::generator::{sanitize_local_part, AliasGenerator};
use super::Alias;
use crate::error::AliasError;

#[derive(Debug, Default)]
pub struct AliasDirectory {
    inner: RwLock<DirectoryInner>,
}

#[derive(Debug, Default)]
struct DirectoryInner {
    next_id: u64,
    by_local_part: HashMap<String, Alias>,
}

impl DirectoryInner {
    fn insert(&mut self, local_part: String) -> Alias {
        self.next_id += 1;
        let alias = Alias {
            id: self.next_id,
            local_part: local_part.clone(),
            enabled: true,
            created_at: Utc::now(),
        };
        self.by_local_part.insert(local_part, alias.clone());
        alias
    }
}

impl AliasDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an explicit local part.
    pub async fn insert(&self, local_part: &str) -> Result<Alias, AliasError> {
        let local_part = sanitize_local_part(local_part.trim());
        if local_part.is_empty() {
            return Err(AliasError::EmptyLocalPart);
        }

        let mut inner = self.inner.write().await;
        if inner.by_local_part.contains_key(&local_part) {
            return Err(AliasError::Duplicate(local_part));
        }

        let alias = inner.insert(local_part);
        info!(alias_id = alias.id, local_part = %alias.local_part, "alias_registered");
        Ok(alias)
    }

    /// Generate a fresh alias and register it atomically.
    pub async fn provision(&self, generator: &AliasGenerator) -> Result<Alias, AliasError> {
        let mut inner = self.inner.write().await;
        let local_part = generator.generate(|candidate| inner.by_local_part.contains_key(candidate))?;

        let alias = inner.insert(local_part);
        info!(alias_id = alias.id, local_part = %alias.local_part, "alias_provisioned");
        Ok(alias)
    }

    /// Whether the local part is taken, enabled or not.
    pub async fn exists(&self, local_part: &str) -> bool {
        self.inner.read().await.by_local_part.contains_key(local_part)
    }

    pub async fn get(&self, local_part: &str) -> Option<Alias> {
        self.inner.read().await.by_local_part.get(local_part).cloned()
    }

    /// Enable or disable an alias. Returns false when it does not exist.
    pub async fn set_enabled(&self, local_part: &str, enabled: bool) -> bool {
        let mut inner = self.inner.write().await;
        match inner.by_local_part.get_mut(local_part) {
            Some(alias) => {
                alias.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_local_part.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ExhaustedError;
    use crate::store::AliasLookup;

    #[tokio::test]
    async fn test_insert_normalizes_and_rejects_duplicates() {
        let directory = AliasDirectory::new();

        let alias = directory.insert(" River-AB12 ").await.unwrap();
        assert_eq!(alias.local_part, "river-ab12");
        assert!(alias.enabled);

        assert!(matches!(
            directory.insert("river-ab12").await,
            Err(AliasError::Duplicate(_))
        ));
        assert!(matches!(
            directory.insert("!!").await,
            Err(AliasError::EmptyLocalPart)
        ));
    }

    #[tokio::test]
    async fn test_lookup_skips_disabled_aliases() {
        let directory = AliasDirectory::new();
        directory.insert("cloud-x9z0").await.unwrap();

        let found = directory.find_enabled_by_local_part("cloud-x9z0").await.unwrap();
        assert!(found.is_some());

        assert!(directory.set_enabled("cloud-x9z0", false).await);
        let found = directory.find_enabled_by_local_part("cloud-x9z0").await.unwrap();
        assert!(found.is_none());
        assert!(directory.exists("cloud-x9z0").await);

        assert!(!directory.set_enabled("missing", false).await);
    }

    #[tokio::test]
    async fn test_provision_generates_unique_aliases() {
        let directory = Arc::new(AliasDirectory::new());
        let generator = Arc::new(AliasGenerator::new(["river"], 4, 10).unwrap());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let directory = directory.clone();
            let generator = generator.clone();
            handles.push(tokio::spawn(async move {
                directory.provision(&generator).await.unwrap()
            }));
        }

        let mut seen = std::collections::HashSet::new();
        for handle in handles {
            let alias = handle.await.unwrap();
            assert!(alias.local_part.starts_with("river-"));
            assert!(seen.insert(alias.local_part));
        }
        assert_eq!(directory.len().await, 16);
    }

    #[tokio::test]
    async fn test_provision_reports_exhaustion() {
        let directory = AliasDirectory::new();
        // A zero-length suffix leaves exactly one possible candidate.
        let generator = AliasGenerator::new(["spark"], 0, 3).unwrap();

        let first = directory.provision(&generator).await.unwrap();
        assert_eq!(first.local_part, "spark-");

        let err = directory.provision(&generator).await.unwrap_err();
        assert!(matches!(
            err,
            AliasError::Exhausted(ExhaustedError { attempts: 3 })
        ));
    }
}
