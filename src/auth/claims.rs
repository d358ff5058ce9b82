//! Claim set carried by access tokens.
//!
//! A claim is a `(type, value)` pair. Several claims may share a type and the
//! collection has no meaningful order, so equality compares the claims as a
//! multiset.

use serde::{Deserialize, Serialize};
use serde_json::map::Entry;
use serde_json::{Map, Value};

use crate::error::AuthError;

/// Claim names written by the issuer itself. Callers may not supply them.
pub const REGISTERED_CLAIMS: [&str; 5] = ["iss", "aud", "exp", "iat", "nbf"];

/// A single typed assertion about the token subject
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Claim {
    #[serde(rename = "type")]
    pub claim_type: String,
    pub value: String,
}

impl Claim {
    pub fn new(claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(Vec<Claim>);

impl Claims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style push.
    pub fn with(mut self, claim_type: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(Claim::new(claim_type, value));
        self
    }

    pub fn push(&mut self, claim: Claim) {
        self.0.push(claim);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Claim> {
        self.0.iter()
    }

    /// First value of the given type
    pub fn get(&self, claim_type: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|c| c.claim_type == claim_type)
            .map(|c| c.value.as_str())
    }

    pub fn contains(&self, claim_type: &str, value: &str) -> bool {
        self.0
            .iter()
            .any(|c| c.claim_type == claim_type && c.value == value)
    }

    /// Serializes the claims into a JWT payload object.
    ///
    /// One claim of a type becomes a JSON string, several become an array in
    /// insertion order.
    ///
    /// # Errors
    /// Returns `AuthError::ReservedClaim` if a claim uses a registered name.
    pub(crate) fn to_payload(&self) -> Result<Map<String, Value>, AuthError> {
        let mut payload = Map::new();

        for claim in &self.0 {
            if REGISTERED_CLAIMS.contains(&claim.claim_type.as_str()) {
                return Err(AuthError::ReservedClaim(claim.claim_type.clone()));
            }

            let value = Value::String(claim.value.clone());
            match payload.entry(claim.claim_type.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
                Entry::Occupied(mut slot) => match slot.get_mut() {
                    Value::Array(values) => values.push(value),
                    existing => {
                        let first = existing.take();
                        *existing = Value::Array(vec![first, value]);
                    }
                },
            }
        }

        Ok(payload)
    }

    /// Reads caller claims back out of a JWT payload, skipping registered
    /// names.
    pub(crate) fn from_payload(payload: &Map<String, Value>) -> Self {
        let mut claims = Claims::new();

        for (claim_type, value) in payload {
            if REGISTERED_CLAIMS.contains(&claim_type.as_str()) {
                continue;
            }
            match value {
                Value::Array(values) => {
                    for v in values {
                        if let Some(text) = value_text(v) {
                            claims.push(Claim::new(claim_type.clone(), text));
                        }
                    }
                }
                other => {
                    if let Some(text) = value_text(other) {
                        claims.push(Claim::new(claim_type.clone(), text));
                    }
                }
            }
        }

        claims
    }
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl PartialEq for Claims {
    fn eq(&self, other: &Self) -> bool {
        if self.0.len() != other.0.len() {
            return false;
        }
        let mut left = self.0.clone();
        let mut right = other.0.clone();
        left.sort();
        right.sort();
        left == right
    }
}

impl Eq for Claims {}

impl FromIterator<Claim> for Claims {
    fn from_iter<I: IntoIterator<Item = Claim>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Claims {
    type Item = &'a Claim;
    type IntoIter = std::slice::Iter<'a, Claim>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Claim>> for Claims {
    fn from(claims: Vec<Claim>) -> Self {
        Self(claims)
    }
}
