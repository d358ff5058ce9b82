//! Refresh token persistence
//!
//! One contract, two backends. The manager only relies on per-id
//! read-after-write and read-after-delete consistency: once `delete` returns
//! `Ok`, no later `get_by_id` or `exists` for that id may observe the record.

mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;

pub use memory::InMemoryRefreshTokenStore;
pub use postgres::PgRefreshTokenStore;

/// Refresh record as persisted: the secret is kept only as a one-way hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRefreshToken {
    pub id: Uuid,
    pub secret_hash: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait RefreshTokenStore: Send + Sync + 'static {
    /// Persist a new record keyed by its id.
    ///
    /// Fails with `StoreError::Duplicate` if a live record already has the id.
    async fn save(&self, record: &StoredRefreshToken) -> Result<(), StoreError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredRefreshToken>, StoreError>;

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError>;

    /// Remove the record. Fails with `StoreError::NotFound` if absent.
    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}
