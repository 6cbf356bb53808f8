use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Maximum length, in characters, of a subject name or credential title.
pub const MAX_FIELD_LEN: usize = 256;

/// Opaque unique identifier of an issued credential.
///
/// Generated once at issuance and used as the sole lookup key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    /// Generate a fresh random identifier (UUIDv4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Wrap an identifier received from a caller.
    ///
    /// Any non-empty string is accepted: lookups of ids that were never issued
    /// simply miss.
    pub fn new(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CoreError::InvalidCredentialId("empty identifier".into()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A signed diploma record.
///
/// `signature` covers the canonical encoding of `id`, `subject_name`,
/// `credential_title` and `issued_at`. `revoked` is registry metadata and is
/// not part of the signed payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    pub subject_name: String,
    pub credential_title: String,
    #[serde(with = "micros_timestamp")]
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub revoked: bool,
    /// Ed25519 signature bytes, base64 on the wire.
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
}

impl Credential {
    /// Summary view used by listings.
    pub fn summary(&self) -> CredentialSummary {
        CredentialSummary {
            id: self.id.clone(),
            subject_name: self.subject_name.clone(),
            credential_title: self.credential_title.clone(),
            issued_at: self.issued_at,
            revoked: self.revoked,
        }
    }

    /// Whether the credential belongs to the given subject.
    pub fn is_owned_by(&self, subject_name: &str) -> bool {
        self.subject_name == subject_name
    }
}

/// Unsigned listing entry for a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialSummary {
    pub id: CredentialId,
    pub subject_name: String,
    pub credential_title: String,
    #[serde(with = "micros_timestamp")]
    pub issued_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Wire and signing spelling of a timestamp: RFC 3339, UTC, microsecond
/// precision, `Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Normalize an issuance timestamp to the precision carried on the wire.
///
/// Timestamps are truncated to microseconds so that the stored value, the
/// JSON form and the canonical encoding all agree.
pub fn normalize_timestamp(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}

/// Validate a human-entered credential field (subject name or title).
pub fn validate_field(name: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::ValidationError(format!("{} must not be empty", name)));
    }
    if value.chars().count() > MAX_FIELD_LEN {
        return Err(CoreError::ValidationError(format!(
            "{} must be at most {} characters",
            name, MAX_FIELD_LEN
        )));
    }
    Ok(())
}

/// Roles a principal can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The institution: issues and revokes credentials, reads all of them.
    Issuer,
    /// A credential subject: reads only their own credentials.
    Holder,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Issuer => "issuer",
            Self::Holder => "holder",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "issuer" => Ok(Self::Issuer),
            "holder" => Ok(Self::Holder),
            other => Err(CoreError::UnknownRole(other.to_string())),
        }
    }
}

/// Trusted claims attached to an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub username: String,
    pub role: Role,
}

impl Claims {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn issuer(username: impl Into<String>) -> Self {
        Self::new(username, Role::Issuer)
    }

    pub fn holder(username: impl Into<String>) -> Self {
        Self::new(username, Role::Holder)
    }
}

/// A stored principal record. Only `username` and `role` ever reach the
/// engine, as [`Claims`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub username: String,
    pub role: Role,
    /// Argon2id PHC string of the principal's password.
    pub credential_hash: String,
}

impl Principal {
    pub fn claims(&self) -> Claims {
        Claims::new(self.username.clone(), self.role)
    }
}

mod micros_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(*ts))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        DateTime::<Utc>::deserialize(deserializer)
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Credential {
        Credential {
            id: CredentialId::new("5b1c2f0e-0000-4000-8000-000000000001").unwrap(),
            subject_name: "Alice".into(),
            credential_title: "BSc Physics".into(),
            issued_at: Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap(),
            revoked: false,
            signature: vec![1, 2, 3, 4],
        }
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = CredentialId::generate();
        let b = CredentialId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_empty_id_rejected() {
        assert!(CredentialId::new("").is_err());
        assert!(CredentialId::new("   ").is_err());
    }

    #[test]
    fn test_signature_is_base64_on_the_wire() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["signature"], "AQIDBA==");
        assert_eq!(json["id"], "5b1c2f0e-0000-4000-8000-000000000001");
        assert_eq!(json["revoked"], false);
    }

    #[test]
    fn test_issued_at_always_carries_six_fraction_digits() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["issued_at"], "2024-06-30T12:00:00.000000Z");

        let mut cred = sample();
        cred.issued_at = Utc.timestamp_opt(1_700_000_000, 130_000_000).unwrap();
        let json = serde_json::to_value(&cred).unwrap();
        assert_eq!(json["issued_at"], "2023-11-14T22:13:20.130000Z");
        assert_eq!(serde_json::from_value::<Credential>(json).unwrap(), cred);
    }

    #[test]
    fn test_bad_base64_signature_fails_to_parse() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["signature"] = serde_json::Value::String("!!not base64!!".into());
        assert!(serde_json::from_value::<Credential>(json).is_err());
    }

    #[test]
    fn test_revoked_defaults_to_false() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json.as_object_mut().unwrap().remove("revoked");
        let back: Credential = serde_json::from_value(json).unwrap();
        assert!(!back.revoked);
    }

    #[test]
    fn test_normalize_timestamp_truncates_to_micros() {
        let ts = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let normalized = normalize_timestamp(ts);
        assert_eq!(normalized.timestamp_subsec_nanos(), 123_456_000);
    }

    #[test]
    fn test_validate_field() {
        assert!(validate_field("subject_name", "Alice").is_ok());
        assert!(validate_field("subject_name", "  ").is_err());
        assert!(validate_field("credential_title", &"x".repeat(MAX_FIELD_LEN + 1)).is_err());
    }

    #[test]
    fn test_role_parse_and_display() {
        assert_eq!("issuer".parse::<Role>().unwrap(), Role::Issuer);
        assert_eq!("holder".parse::<Role>().unwrap(), Role::Holder);
        assert!("admin".parse::<Role>().is_err());
        assert_eq!(format!("{}", Role::Holder), "holder");
    }

    #[test]
    fn test_role_serde_lowercase() {
        let json = serde_json::to_string(&Claims::issuer("school")).unwrap();
        assert_eq!(json, r#"{"username":"school","role":"issuer"}"#);
    }

    #[test]
    fn test_summary_and_ownership() {
        let cred = sample();
        let summary = cred.summary();
        assert_eq!(summary.id, cred.id);
        assert!(!summary.revoked);
        assert!(cred.is_owned_by("Alice"));
        assert!(!cred.is_owned_by("alice"));
    }

    #[test]
    fn test_principal_claims() {
        let p = Principal {
            username: "student".into(),
            role: Role::Holder,
            credential_hash: "$argon2id$...".into(),
        };
        assert_eq!(p.claims(), Claims::holder("student"));
    }
}
