//! Process-memory refresh token store.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RefreshTokenStore, StoredRefreshToken};
use crate::error::StoreError;

/// Records live in a `HashMap` behind one `RwLock`; every mutation takes the
/// write lock, which gives the per-id consistency the contract asks for.
/// Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRefreshTokenStore {
    records: Arc<RwLock<HashMap<Uuid, StoredRefreshToken>>>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryRefreshTokenStore {
    async fn save(&self, record: &StoredRefreshToken) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.entry(record.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(record.id)),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredRefreshToken>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        Ok(self.records.read().await.contains_key(&id))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        match self.records.write().await.remove(&id) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record() -> StoredRefreshToken {
        StoredRefreshToken {
            id: Uuid::new_v4(),
            secret_hash: "hash".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let store = InMemoryRefreshTokenStore::new();
        let record = record();

        store.save(&record).await.expect("Failed to save");

        assert_eq!(store.get_by_id(record.id).await.expect("get"), Some(record.clone()));
        assert!(store.exists(record.id).await.expect("exists"));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_is_rejected() {
        let store = InMemoryRefreshTokenStore::new();
        let record = record();

        store.save(&record).await.expect("Failed to save");
        assert!(matches!(
            store.save(&record).await,
            Err(StoreError::Duplicate(id)) if id == record.id
        ));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_read_after_delete() {
        let store = InMemoryRefreshTokenStore::new();
        let record = record();
        store.save(&record).await.expect("Failed to save");

        store.delete(record.id).await.expect("Failed to delete");

        assert!(store.get_by_id(record.id).await.expect("get").is_none());
        assert!(!store.exists(record.id).await.expect("exists"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_delete_absent_reports_not_found() {
        let store = InMemoryRefreshTokenStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(store.delete(id).await, Err(StoreError::NotFound(missing)) if missing == id));
    }

    #[tokio::test]
    async fn test_clones_share_records() {
        let store = InMemoryRefreshTokenStore::new();
        let clone = store.clone();
        let record = record();

        store.save(&record).await.expect("Failed to save");
        assert!(clone.exists(record.id).await.expect("exists"));
    }
}
