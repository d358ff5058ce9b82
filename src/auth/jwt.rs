//! Access token issuance and validation.
//!
//! Tokens are compact HS256 JWS strings. The validator pins the algorithm
//! before touching the signature, so `none` or any other algorithm is refused
//! whatever key the caller holds.

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, encode, Header, Validation};
use serde_json::{Map, Value};

use crate::auth::claims::Claims;
use crate::auth::signing::{SigningContext, SIGNING_ALGORITHM};
use crate::error::AuthError;

const SECONDS_PER_HOUR: i64 = 3600;

/// A validated token with its registered claims broken out
#[derive(Debug, Clone)]
pub struct DecodedToken {
    pub issuer: Option<String>,
    pub audiences: Vec<String>,
    pub issued_at: Option<i64>,
    pub expires_at: Option<i64>,
    pub claims: Claims,
}

/// Issue a signed access token for the given claims
///
/// `iat` is always set. `exp` is set to now plus the configured hours only
/// when the expiry parsed as an integer, so negative values yield a token
/// that is already expired.
///
/// # Errors
/// Returns `AuthError::ReservedClaim` if a claim uses a registered name.
pub fn issue_access_token(claims: &Claims, context: &SigningContext) -> Result<String, AuthError> {
    let mut payload = claims.to_payload()?;
    let now = Utc::now().timestamp();

    if let Some(issuer) = context.issuer() {
        payload.insert("iss".to_string(), Value::from(issuer));
    }
    if let Some(audience) = context.audience() {
        payload.insert("aud".to_string(), Value::from(audience));
    }
    payload.insert("iat".to_string(), Value::from(now));
    if let Some(hours) = context.expiry_hours() {
        let exp = now.saturating_add(i64::from(hours).saturating_mul(SECONDS_PER_HOUR));
        payload.insert("exp".to_string(), Value::from(exp));
    }

    encode(
        &Header::new(SIGNING_ALGORITHM),
        &payload,
        context.encoding_key(),
    )
    .map_err(|e| AuthError::InvalidToken(format!("token generation failed: {}", e)))
}

/// Validate an access token and return its caller claims
///
/// # Arguments
/// * `token` - Compact JWT string
/// * `context` - Signing context the token must have been produced under
/// * `ignore_expiry` - Skip the lifetime check. Only the rotation path sets
///   this; signature, algorithm, issuer and audience are still enforced.
///
/// # Errors
/// Returns `AuthError::InvalidToken` if the token is malformed, uses another
/// algorithm, fails signature verification, or fails an enabled check.
pub fn validate_access_token(
    token: &str,
    context: &SigningContext,
    ignore_expiry: bool,
) -> Result<Claims, AuthError> {
    decode_access_token(token, context, ignore_expiry).map(|decoded| decoded.claims)
}

/// Same checks as [`validate_access_token`], returning the full view.
pub fn decode_access_token(
    token: &str,
    context: &SigningContext,
    ignore_expiry: bool,
) -> Result<DecodedToken, AuthError> {
    let header = decode_header(token).map_err(|e| {
        tracing::warn!("JWT header could not be parsed: {}", e);
        AuthError::InvalidToken("malformed token".to_string())
    })?;

    if header.alg != SIGNING_ALGORITHM {
        tracing::warn!(alg = ?header.alg, "JWT signed with disallowed algorithm");
        return Err(AuthError::InvalidToken(format!(
            "algorithm {:?} is not allowed",
            header.alg
        )));
    }

    let validation = build_validation(context, ignore_expiry);

    let data = decode::<Map<String, Value>>(token, context.decoding_key(), &validation).map_err(
        |e| {
            tracing::warn!("JWT validation error: {}", e);
            AuthError::InvalidToken(describe(e.kind()).to_string())
        },
    )?;

    let payload = data.claims;
    let expires_at = payload.get("exp").and_then(Value::as_i64);

    // The library reads `exp` as unsigned and skips values it cannot parse,
    // so negative and non-integer expiries are checked here.
    if validation.validate_exp {
        if payload.contains_key("exp") && expires_at.is_none() {
            tracing::warn!("JWT carries a non-integer exp claim");
            return Err(AuthError::InvalidToken("malformed token".to_string()));
        }
        if let Some(exp) = expires_at {
            let leeway = i64::try_from(validation.leeway).unwrap_or(i64::MAX);
            if exp < Utc::now().timestamp().saturating_sub(leeway) {
                return Err(AuthError::InvalidToken(
                    describe(&ErrorKind::ExpiredSignature).to_string(),
                ));
            }
        }
    }

    Ok(DecodedToken {
        issuer: payload.get("iss").and_then(Value::as_str).map(str::to_string),
        audiences: audiences(payload.get("aud")),
        issued_at: payload.get("iat").and_then(Value::as_i64),
        expires_at,
        claims: Claims::from_payload(&payload),
    })
}

fn build_validation(context: &SigningContext, ignore_expiry: bool) -> Validation {
    let mut validation = Validation::new(SIGNING_ALGORITHM);
    // A token without `exp` is valid; only a present `exp` is checked.
    validation.required_spec_claims.clear();
    validation.validate_exp = context.validates_lifetime() && !ignore_expiry;
    validation.validate_nbf = validation.validate_exp;

    if let Some(issuer) = context.issuer() {
        validation.set_issuer(&[issuer]);
        validation.required_spec_claims.insert("iss".to_string());
    }
    match context.audience() {
        Some(audience) => {
            validation.set_audience(&[audience]);
            validation.required_spec_claims.insert("aud".to_string());
        }
        None => validation.validate_aud = false,
    }

    validation
}

fn audiences(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::String(aud)) => vec![aud.clone()],
        Some(Value::Array(values)) => values
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

fn describe(kind: &ErrorKind) -> &'static str {
    match kind {
        ErrorKind::ExpiredSignature => "token has expired",
        ErrorKind::ImmatureSignature => "token is not yet valid",
        ErrorKind::InvalidSignature => "signature verification failed",
        ErrorKind::InvalidAlgorithm => "algorithm is not allowed",
        ErrorKind::InvalidIssuer => "issuer mismatch",
        ErrorKind::InvalidAudience => "audience mismatch",
        ErrorKind::MissingRequiredClaim(_) => "required claim missing",
        _ => "malformed token",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::JwtSettings;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine as _;
    use jsonwebtoken::{Algorithm, EncodingKey};

    fn context(key: &str, expiry: Option<&str>) -> SigningContext {
        SigningContext::from_settings(&JwtSettings {
            key: Some(key.to_string()),
            issuer: Some("I".to_string()),
            audience: Some("A".to_string()),
            expiry_hours: expiry.map(str::to_string),
        })
        .expect("Failed to build signing context")
    }

    fn sample_claims() -> Claims {
        Claims::new().with("sub", "123").with("name", "Tess")
    }

    #[test]
    fn test_issue_and_validate_round_trip() {
        let ctx = context("k1", Some("1"));
        let claims = sample_claims().with("role", "admin").with("role", "editor");

        let token = issue_access_token(&claims, &ctx).expect("Failed to issue token");
        let validated = validate_access_token(&token, &ctx, false).expect("Failed to validate");

        assert_eq!(validated, claims);
    }

    #[test]
    fn test_issued_token_carries_issuer_and_audience() {
        let ctx = context("k1", Some("1"));
        let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");
        let decoded = decode_access_token(&token, &ctx, false).expect("Failed to decode");

        assert_eq!(decoded.issuer.as_deref(), Some("I"));
        assert!(decoded.audiences.iter().any(|a| a == "A"));
        assert!(decoded.claims.contains("sub", "123"));
        assert!(decoded.claims.contains("name", "Tess"));
        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_expiry_of_one_hour() {
        let ctx = context("k1", Some("1"));
        let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");
        let decoded = decode_access_token(&token, &ctx, false).expect("Failed to decode");

        let iat = decoded.issued_at.expect("iat");
        let exp = decoded.expires_at.expect("exp");
        assert_eq!(exp - iat, 3600);
        assert!((iat - Utc::now().timestamp()).abs() <= 5);
    }

    #[test]
    fn test_non_numeric_or_absent_expiry_omits_exp() {
        for expiry in [Some("abc"), None] {
            let ctx = context("k1", expiry);
            let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");
            let decoded = decode_access_token(&token, &ctx, false).expect("Failed to decode");
            assert!(decoded.expires_at.is_none(), "expiry {:?}", expiry);
        }
    }

    #[test]
    fn test_negative_expiry_issues_expired_token() {
        let ctx = context("k1", Some("-1"));
        let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");

        match validate_access_token(&token, &ctx, false) {
            Err(AuthError::InvalidToken(reason)) => assert_eq!(reason, "token has expired"),
            other => panic!("Expected expired token, got {:?}", other),
        }

        let claims = validate_access_token(&token, &ctx, true).expect("ignore_expiry should pass");
        assert_eq!(claims, sample_claims());
    }

    #[test]
    fn test_extreme_negative_expiry_is_still_expired() {
        let ctx = context("k1", Some("-2147483648"));
        let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");

        assert!(validate_access_token(&token, &ctx, false).is_err());
        assert!(validate_access_token(&token, &ctx, true).is_ok());
    }

    #[test]
    fn test_huge_expiry_is_far_future() {
        let ctx = context("k1", Some("99999"));
        let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");
        let decoded = decode_access_token(&token, &ctx, false).expect("Failed to decode");
        let remaining = decoded.expires_at.expect("exp") - Utc::now().timestamp();
        assert!(remaining > 99_998 * 3600);
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let token = issue_access_token(&sample_claims(), &context("k1", Some("1")))
            .expect("Failed to issue token");

        let result = validate_access_token(&token, &context("k2", Some("1")), false);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));

        let result = validate_access_token(&token, &context("k2", Some("1")), true);
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_alg_none_is_rejected() {
        let ctx = context("k1", None);
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(r#"{"sub":"123","iss":"I","aud":"A"}"#);
        let token = format!("{}.{}.", header, payload);

        assert!(matches!(
            validate_access_token(&token, &ctx, true),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_other_hmac_algorithm_is_rejected() {
        let ctx = context("k1", None);
        let payload = serde_json::json!({"sub": "123", "iss": "I", "aud": "A"});
        let token = encode(
            &Header::new(Algorithm::HS384),
            &payload,
            &EncodingKey::from_secret(b"k1"),
        )
        .expect("Failed to encode HS384 token");

        match validate_access_token(&token, &ctx, true) {
            Err(AuthError::InvalidToken(reason)) => assert!(reason.contains("not allowed")),
            other => panic!("Expected algorithm rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_tampered_token() {
        let ctx = context("k1", Some("1"));
        let token = issue_access_token(&sample_claims(), &ctx).expect("Failed to issue token");

        let tampered = format!("{}X", token);
        assert!(validate_access_token(&tampered, &ctx, false).is_err());
    }

    #[test]
    fn test_garbage_token() {
        let ctx = context("k1", Some("1"));
        assert!(matches!(
            validate_access_token("invalid.token.here", &ctx, false),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(validate_access_token("", &ctx, false).is_err());
    }

    #[test]
    fn test_wrong_issuer_and_audience() {
        let issuing = context("k1", Some("1"));
        let token = issue_access_token(&sample_claims(), &issuing).expect("Failed to issue token");

        let other_issuer = SigningContext::from_settings(&JwtSettings {
            key: Some("k1".to_string()),
            issuer: Some("someone-else".to_string()),
            audience: Some("A".to_string()),
            expiry_hours: Some("1".to_string()),
        })
        .expect("context");
        assert!(validate_access_token(&token, &other_issuer, false).is_err());

        let other_audience = SigningContext::from_settings(&JwtSettings {
            key: Some("k1".to_string()),
            issuer: Some("I".to_string()),
            audience: Some("B".to_string()),
            expiry_hours: Some("1".to_string()),
        })
        .expect("context");
        assert!(validate_access_token(&token, &other_audience, false).is_err());
    }

    #[test]
    fn test_missing_issuer_or_audience_is_rejected() {
        let ctx = context("k1", Some("1"));
        let key = EncodingKey::from_secret(b"k1");
        let header = Header::new(Algorithm::HS256);

        let payloads = vec![
            (serde_json::json!({ "sub": "1" }), "no iss or aud"),
            (serde_json::json!({ "sub": "1", "aud": "A" }), "no iss"),
            (serde_json::json!({ "sub": "1", "iss": "I" }), "no aud"),
        ];

        for (payload, reason) in payloads {
            let token = encode(&header, &payload, &key).expect("Failed to encode");
            assert!(
                matches!(
                    validate_access_token(&token, &ctx, true),
                    Err(AuthError::InvalidToken(_))
                ),
                "Should reject token with {}",
                reason
            );
        }
    }

    #[test]
    fn test_future_not_before_is_rejected() {
        let ctx = context("k1", Some("1"));
        let key = EncodingKey::from_secret(b"k1");
        let now = Utc::now().timestamp();
        let payload = serde_json::json!({
            "sub": "1", "iss": "I", "aud": "A",
            "exp": now + 3600, "nbf": 99_999_999_999_i64,
        });
        let token = encode(&Header::new(Algorithm::HS256), &payload, &key).expect("Failed to encode");

        assert!(matches!(
            validate_access_token(&token, &ctx, false),
            Err(AuthError::InvalidToken(_))
        ));
        // Rotation reads claims regardless of the token's time window
        assert!(validate_access_token(&token, &ctx, true).is_ok());
    }

    #[test]
    fn test_non_integer_expiry_claim_is_rejected() {
        let ctx = context("k1", Some("1"));
        let key = EncodingKey::from_secret(b"k1");
        let payload = serde_json::json!({ "sub": "1", "iss": "I", "aud": "A", "exp": "soon" });
        let token = encode(&Header::new(Algorithm::HS256), &payload, &key).expect("Failed to encode");

        assert!(matches!(
            validate_access_token(&token, &ctx, false),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(validate_access_token(&token, &ctx, true).is_ok());
    }

    #[test]
    fn test_disabled_issuer_and_audience_checks_are_skipped() {
        let issuing = context("k1", Some("1"));
        let token = issue_access_token(&sample_claims(), &issuing).expect("Failed to issue token");

        let lenient = SigningContext::from_settings(&JwtSettings {
            key: Some("k1".to_string()),
            ..Default::default()
        })
        .expect("context");

        let claims = validate_access_token(&token, &lenient, false).expect("should validate");
        assert_eq!(claims, sample_claims());
    }

    #[test]
    fn test_reserved_claim_cannot_be_issued() {
        let ctx = context("k1", Some("1"));
        let claims = Claims::new().with("iss", "spoofed");
        assert!(matches!(
            issue_access_token(&claims, &ctx),
            Err(AuthError::ReservedClaim(_))
        ));
    }
}
