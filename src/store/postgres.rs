//! PostgreSQL refresh token store.
//!
//! Expects the `refresh_tokens` table from `migrations/`. Each statement runs
//! in its own implicit transaction, so a committed `DELETE` is visible to the
//! next query on any pooled connection.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{RefreshTokenStore, StoredRefreshToken};
use crate::error::StoreError;

const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, Clone)]
pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    /// Returns error if a migration fails to apply
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn save(&self, record: &StoredRefreshToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (id, secret_hash, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(record.id)
        .bind(&record.secret_hash)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let duplicate = e
                .as_database_error()
                .and_then(|db| db.code())
                .map_or(false, |code| code == UNIQUE_VIOLATION);
            if duplicate {
                StoreError::Duplicate(record.id)
            } else {
                StoreError::Database(e)
            }
        })?;

        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<StoredRefreshToken>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, DateTime<Utc>)>(
            r#"
            SELECT id, secret_hash, created_at
            FROM refresh_tokens
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, secret_hash, created_at)| StoredRefreshToken {
            id,
            secret_hash,
            created_at,
        }))
    }

    async fn exists(&self, id: Uuid) -> Result<bool, StoreError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refresh_tokens WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            tracing::debug!(token_id = %id, "Delete matched no refresh token");
            return Err(StoreError::NotFound(id));
        }

        Ok(())
    }
}
