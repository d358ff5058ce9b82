//! Signing context: key material and validation policy, built once from
//! `JwtSettings` and shared read-only afterwards.

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use crate::configuration::JwtSettings;
use crate::error::AuthError;

/// The only algorithm tokens are signed with or accepted under.
pub const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// Immutable bundle used to issue and validate access tokens
#[derive(Clone)]
pub struct SigningContext {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
    audience: Option<String>,
    expiry_hours: Option<i32>,
    validate_lifetime: bool,
}

impl std::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("algorithm", &SIGNING_ALGORITHM)
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("expiry_hours", &self.expiry_hours)
            .field("validate_lifetime", &self.validate_lifetime)
            .finish()
    }
}

impl SigningContext {
    /// Build the context from configuration.
    ///
    /// Issuer and audience are kept only when non-empty, and each enables its
    /// own validation. Lifetime validation is enabled whenever an expiry value
    /// is configured, even one that does not parse; such a value simply leaves
    /// issued tokens without an `exp` claim.
    ///
    /// # Errors
    /// Returns `AuthError::Configuration` if the signing key is absent or empty.
    pub fn from_settings(settings: &JwtSettings) -> Result<Self, AuthError> {
        let key = settings
            .key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::Configuration("signing key not found".to_string()))?;

        let expiry = non_empty(&settings.expiry_hours);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            issuer: non_empty(&settings.issuer),
            audience: non_empty(&settings.audience),
            expiry_hours: expiry.as_deref().and_then(|e| e.trim().parse::<i32>().ok()),
            validate_lifetime: expiry.is_some(),
        })
    }

    /// Convenience for callers that share one context between services.
    pub fn shared(settings: &JwtSettings) -> Result<Arc<Self>, AuthError> {
        Self::from_settings(settings).map(Arc::new)
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn audience(&self) -> Option<&str> {
        self.audience.as_deref()
    }

    /// Parsed expiry in hours, `None` when absent or non-numeric.
    pub fn expiry_hours(&self) -> Option<i32> {
        self.expiry_hours
    }

    pub fn validates_issuer(&self) -> bool {
        self.issuer.is_some()
    }

    pub fn validates_audience(&self) -> bool {
        self.audience.is_some()
    }

    pub fn validates_lifetime(&self) -> bool {
        self.validate_lifetime
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding_key
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding_key
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.is_empty()).cloned()
}
