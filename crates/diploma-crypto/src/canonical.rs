//! Canonical encoding of a credential's signable fields.
//!
//! [`CanonicalBytes`] is the only input ever handed to signing and to
//! signature verification. Its construction is fixed:
//!
//! 1. Serialize to a JSON value.
//! 2. Rebuild every object with keys in lexicographic order.
//! 3. Emit compact JSON (no insignificant whitespace).
//!
//! Verification re-derives these bytes from presented field values and must
//! reproduce what was signed byte for byte, so the signed field set and the
//! timestamp format below must never change once credentials exist.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use diploma_core::types::format_timestamp;
use diploma_core::Credential;

use crate::error::CryptoError;

/// Bytes produced exclusively by canonicalization. The inner vector is
/// private, so signing code cannot be handed ad-hoc bytes by mistake.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Canonicalize any serializable value.
    pub fn new(obj: &impl Serialize) -> Result<Self, CryptoError> {
        let value = serde_json::to_value(obj)?;
        let sorted = sort_keys(value);
        Ok(Self(serde_json::to_vec(&sorted)?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Recursively rebuild objects through a `BTreeMap`, independent of whether
/// `serde_json` was compiled with order preservation.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// The fields covered by a credential signature.
///
/// `revoked` is intentionally absent: revocation is registry state, checked
/// before the signature, and must not invalidate issued signatures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignableFields<'a> {
    pub id: &'a str,
    pub subject_name: &'a str,
    pub credential_title: &'a str,
    /// RFC 3339, UTC, microsecond precision, `Z` suffix.
    pub issued_at: String,
}

impl<'a> SignableFields<'a> {
    pub fn new(
        id: &'a str,
        subject_name: &'a str,
        credential_title: &'a str,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            subject_name,
            credential_title,
            issued_at: format_timestamp(issued_at),
        }
    }

    pub fn from_credential(credential: &'a Credential) -> Self {
        Self::new(
            credential.id.as_str(),
            &credential.subject_name,
            &credential.credential_title,
            credential.issued_at,
        )
    }

    pub fn canonical_bytes(&self) -> Result<CanonicalBytes, CryptoError> {
        CanonicalBytes::new(self)
    }
}
