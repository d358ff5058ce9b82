//! Error handling for token issuance, validation and refresh rotation.
//!
//! Every failure the core can produce is one `AuthError` variant, so callers
//! branch on the kind instead of inspecting messages. Store backends report
//! `StoreError`, which the manager folds into `AuthError::Storage` (or into a
//! more specific kind where the store's answer has protocol meaning).

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use uuid::Uuid;

// ============================================================================
// 1. STORAGE ERRORS
// ============================================================================

/// Errors reported by a `RefreshTokenStore` backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("refresh token {0} not found")]
    NotFound(Uuid),

    #[error("refresh token {0} already exists")]
    Duplicate(Uuid),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

// ============================================================================
// 2. CORE ERROR KINDS
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Signing key missing or empty. Fatal, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("missing or invalid authorization header")]
    MissingBearerToken,

    /// A caller-submitted auth response lacks required fields.
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    #[error("refresh token {0} not found")]
    TokenNotFound(Uuid),

    #[error("invalid refresh token")]
    InvalidRefreshToken,

    #[error("storage error: {0}")]
    Storage(StoreError),

    #[error("claim type '{0}' is reserved for the token issuer")]
    ReservedClaim(String),

    #[error("secure random source unavailable: {0}")]
    SecureRandomUnavailable(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Storage(err)
    }
}

impl AuthError {
    /// Stable machine-readable code sent to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Configuration(_) => "CONFIG_ERROR",
            AuthError::InvalidToken(_) => "TOKEN_INVALID",
            AuthError::MissingBearerToken => "MISSING_TOKEN",
            AuthError::MalformedRequest(_) => "MALFORMED_REQUEST",
            AuthError::TokenNotFound(_) => "REFRESH_TOKEN_NOT_FOUND",
            AuthError::InvalidRefreshToken => "REFRESH_TOKEN_INVALID",
            AuthError::Storage(_) => "STORAGE_UNAVAILABLE",
            AuthError::ReservedClaim(_) | AuthError::SecureRandomUnavailable(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    /// Message safe to show a client. Server-side details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            AuthError::InvalidToken(_) => "Invalid or expired token".to_string(),
            AuthError::MissingBearerToken => "Missing authentication token".to_string(),
            AuthError::MalformedRequest(_) => self.to_string(),
            AuthError::TokenNotFound(_) | AuthError::InvalidRefreshToken => {
                "Reauthentication required".to_string()
            }
            AuthError::Storage(_) => "Token storage temporarily unavailable".to_string(),
            AuthError::Configuration(_) => "Server configuration error".to_string(),
            AuthError::ReservedClaim(_) | AuthError::SecureRandomUnavailable(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Emits one log line for this error, keyed by the error id returned to
    /// the client.
    pub fn log_error(&self, error_id: &str) {
        match self {
            AuthError::InvalidToken(_)
            | AuthError::MissingBearerToken
            | AuthError::MalformedRequest(_)
            | AuthError::TokenNotFound(_)
            | AuthError::InvalidRefreshToken => {
                tracing::warn!(error_id = error_id, code = self.code(), error = %self, "Authentication rejected");
            }
            AuthError::Storage(e) => {
                tracing::error!(error_id = error_id, error = %e, "Refresh token storage failure");
            }
            _ => {
                tracing::error!(error_id = error_id, code = self.code(), error = %self, "Internal authentication error");
            }
        }
    }
}

// ============================================================================
// 3. HTTP RESPONSE MAPPING
// ============================================================================

/// Error body returned by every endpoint
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    /// Id under which the failure was logged
    pub error_id: String,
    pub message: String,
    pub code: String,
    pub status: u16,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_id: String, message: String, code: String, status: u16) -> Self {
        Self {
            error_id,
            message,
            code,
            status,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            AuthError::InvalidToken(_)
            | AuthError::MissingBearerToken
            | AuthError::TokenNotFound(_)
            | AuthError::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            AuthError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Configuration(_)
            | AuthError::ReservedClaim(_)
            | AuthError::SecureRandomUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_id = Uuid::new_v4().to_string();
        self.log_error(&error_id);

        let status = self.status_code();
        let body = ErrorResponse::new(
            error_id,
            self.public_message(),
            self.code().to_string(),
            status.as_u16(),
        );

        HttpResponse::build(status).json(body)
    }
}

// ============================================================================
// 4. ERROR CONTEXT ENRICHMENT
// ============================================================================

/// Per-request context for handler-level logging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub request_id: String,
    pub operation: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ErrorContext {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            operation: operation.into(),
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn log_error(&self, error: &AuthError) {
        tracing::warn!(
            request_id = %self.request_id,
            operation = %self.operation,
            timestamp = %self.timestamp.to_rfc3339(),
            code = error.code(),
            error = %error,
            "Operation failed"
        );
    }
}
