//! Refresh Token Management
//!
//! Handles refresh secret generation, persistence and single-use rotation.
//! Refresh records are:
//! - An opaque UUID id plus a 32-byte random secret
//! - Stored with the secret hashed by SHA-256 (never store plaintext)
//! - Single-use: rotation deletes the presented record before reissuing
//! - Fail-closed: no new pair is issued unless the old record was deleted

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use constant_time_eq::constant_time_eq;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::auth::claims::Claims;
use crate::auth::jwt::{issue_access_token, validate_access_token};
use crate::auth::signing::SigningContext;
use crate::error::{AuthError, StoreError};
use crate::store::{RefreshTokenStore, StoredRefreshToken};

const SECRET_BYTES: usize = 32;

/// Refresh credential handed to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshRecord {
    pub id: Uuid,
    pub secret: String,
}

/// Access token plus refresh record, as issued and as presented back
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_record: RefreshRecord,
}

/// Caller-submitted auth response. Every field may be missing on the wire;
/// `RefreshTokenManager::rotate` rejects incomplete requests.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateRequest {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_record: Option<RefreshRecordRequest>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshRecordRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub secret: Option<String>,
}

impl From<AuthResponse> for RotateRequest {
    fn from(auth: AuthResponse) -> Self {
        Self {
            access_token: Some(auth.access_token),
            refresh_record: Some(RefreshRecordRequest {
                id: Some(auth.refresh_record.id),
                secret: Some(auth.refresh_record.secret),
            }),
        }
    }
}

impl RotateRequest {
    /// Extracts (access token, id, secret), rejecting absent or empty parts.
    fn into_parts(self) -> Result<(String, Uuid, String), AuthError> {
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::MalformedRequest("access token is missing".to_string()))?;
        let record = self
            .refresh_record
            .ok_or_else(|| AuthError::MalformedRequest("refresh record is missing".to_string()))?;
        let id = record
            .id
            .ok_or_else(|| AuthError::MalformedRequest("refresh record id is missing".to_string()))?;
        let secret = record
            .secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AuthError::MalformedRequest("refresh record secret is missing".to_string())
            })?;

        Ok((access_token, id, secret))
    }
}

/// Generate a new refresh secret
///
/// 32 bytes from the operating system's CSPRNG, base64url encoded without
/// padding. The plaintext goes to the client; the store keeps only its hash.
///
/// # Errors
/// Returns `AuthError::SecureRandomUnavailable` if the OS source fails. This
/// is never retried.
pub fn generate_secret() -> Result<String, AuthError> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AuthError::SecureRandomUnavailable(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 of the secret, hex encoded.
fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Compares a presented secret against a stored hash in constant time.
fn verify_secret(presented: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_secret(presented).as_bytes(), stored_hash.as_bytes())
}

/// Issues access/refresh pairs and rotates them.
///
/// Only exists with a store attached; services that need plain access tokens
/// use `issue_access_token` / `validate_access_token` with a
/// `SigningContext` directly.
#[derive(Clone)]
pub struct RefreshTokenManager {
    context: Arc<SigningContext>,
    store: Arc<dyn RefreshTokenStore>,
}

impl std::fmt::Debug for RefreshTokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshTokenManager")
            .field("context", &self.context)
            .finish()
    }
}

impl RefreshTokenManager {
    pub fn new(context: Arc<SigningContext>, store: Arc<dyn RefreshTokenStore>) -> Self {
        Self { context, store }
    }

    pub fn context(&self) -> &SigningContext {
        &self.context
    }

    pub fn shared_context(&self) -> Arc<SigningContext> {
        Arc::clone(&self.context)
    }

    /// Issue an access token and a freshly persisted refresh record
    ///
    /// # Errors
    /// Returns `AuthError::Storage` if the record could not be saved. No pair
    /// is returned without a persisted record.
    pub async fn create(&self, claims: &Claims) -> Result<AuthResponse, AuthError> {
        let access_token = issue_access_token(claims, &self.context)?;
        let secret = generate_secret()?;
        let id = Uuid::new_v4();

        self.store
            .save(&StoredRefreshToken {
                id,
                secret_hash: hash_secret(&secret),
                created_at: Utc::now(),
            })
            .await?;

        tracing::info!(token_id = %id, "Refresh token issued");

        Ok(AuthResponse {
            access_token,
            refresh_record: RefreshRecord { id, secret },
        })
    }

    /// Exchange a previously issued pair for a new one
    ///
    /// The presented record is consumed: it is deleted before the new pair is
    /// issued, and it is never restored if issuance then fails.
    ///
    /// # Errors
    /// - `MalformedRequest` if any part of the request is missing
    /// - `InvalidToken` if the access token's signature, algorithm, issuer or
    ///   audience is wrong (expiry is ignored)
    /// - `TokenNotFound` if the record is unknown or was consumed concurrently
    /// - `InvalidRefreshToken` if the secret does not match
    /// - `Storage` if the store fails
    pub async fn rotate(&self, request: RotateRequest) -> Result<AuthResponse, AuthError> {
        let (access_token, id, secret) = request.into_parts()?;

        let claims = validate_access_token(&access_token, &self.context, true)?;

        let stored = self.store.get_by_id(id).await?.ok_or_else(|| {
            tracing::warn!(token_id = %id, "Refresh token not found");
            AuthError::TokenNotFound(id)
        })?;

        if !verify_secret(&secret, &stored.secret_hash) {
            tracing::warn!(token_id = %id, "Refresh token secret mismatch");
            return Err(AuthError::InvalidRefreshToken);
        }

        self.store.delete(id).await.map_err(|e| match e {
            StoreError::NotFound(id) => {
                tracing::warn!(token_id = %id, "Refresh token consumed concurrently");
                AuthError::TokenNotFound(id)
            }
            other => AuthError::Storage(other),
        })?;

        tracing::info!(token_id = %id, "Refresh token consumed");

        self.create(&claims).await
    }

    /// Delete a refresh record unconditionally
    ///
    /// # Errors
    /// Returns `AuthError::TokenNotFound` if no record has this id.
    pub async fn revoke(&self, id: Uuid) -> Result<(), AuthError> {
        self.store.delete(id).await.map_err(|e| match e {
            StoreError::NotFound(id) => AuthError::TokenNotFound(id),
            other => AuthError::Storage(other),
        })?;

        tracing::info!(token_id = %id, "Refresh token revoked");
        Ok(())
    }
}
