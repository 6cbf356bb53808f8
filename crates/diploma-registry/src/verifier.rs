use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use diploma_core::types::format_timestamp;
use diploma_core::{
    Credential, CredentialId, Verdict, VerificationEvent, VerificationState,
    VerificationStateMachine,
};
use diploma_crypto::SignableFields;

use crate::error::RegistryError;
use crate::registry::CredentialRegistry;

/// Caller-supplied fields, decoded but not yet trusted.
struct Presented<'a> {
    subject_name: &'a str,
    credential_title: &'a str,
    issued_at: DateTime<Utc>,
    signature: Vec<u8>,
}

impl<'a> Presented<'a> {
    /// `None` if any signable field is absent, undecodable, or not in its
    /// canonical spelling.
    fn decode(record: &'a Map<String, Value>) -> Option<Self> {
        let subject_name = record.get("subject_name")?.as_str()?;
        let credential_title = record.get("credential_title")?.as_str()?;
        let raw_issued_at = record.get("issued_at")?.as_str()?;
        let issued_at = DateTime::parse_from_rfc3339(raw_issued_at)
            .ok()?
            .with_timezone(&Utc);
        // Any other spelling of the same instant is a different record.
        if format_timestamp(issued_at) != raw_issued_at {
            return None;
        }
        let signature = STANDARD
            .decode(record.get("signature")?.as_str()?.as_bytes())
            .ok()?;
        Some(Self {
            subject_name,
            credential_title,
            issued_at,
            signature,
        })
    }
}

/// Turns a presented credential into a trust verdict.
///
/// Checks run in a fixed order: registry lookup, then the stored revoked
/// flag, then the signature over the fields exactly as the caller sent
/// them. Read-only with respect to the registry.
#[derive(Clone)]
pub struct CredentialVerifier {
    registry: CredentialRegistry,
}

impl CredentialVerifier {
    pub fn new(registry: CredentialRegistry) -> Self {
        Self { registry }
    }

    /// Verify an untrusted JSON record.
    ///
    /// Only store failures are errors; every property of the input itself
    /// ends up in the verdict.
    pub async fn verify(&self, record: &Value) -> Result<Verdict, RegistryError> {
        let mut state = VerificationState::Unchecked;

        let Some((fields, id)) = record.as_object().and_then(|fields| {
            let id = fields.get("id")?.as_str()?;
            CredentialId::new(id).ok().map(|id| (fields, id))
        }) else {
            state = VerificationStateMachine::transition(state, VerificationEvent::InputRejected)?;
            return Ok(self.finish(state, None));
        };

        let Some(stored) = self.registry.lookup(&id).await? else {
            state = VerificationStateMachine::transition(state, VerificationEvent::LookupMissed)?;
            return Ok(self.finish(state, Some(&id)));
        };

        if stored.revoked {
            state = VerificationStateMachine::transition(state, VerificationEvent::RevokedFlagSet)?;
            return Ok(self.finish(state, Some(&id)));
        }

        let event = match Presented::decode(fields) {
            Some(presented) if self.signature_matches(&id, &presented) => {
                VerificationEvent::SignatureAccepted
            }
            _ => VerificationEvent::SignatureRejected,
        };
        state = VerificationStateMachine::transition(state, event)?;

        let verdict = self.finish(state, Some(&id));
        Ok(if verdict.valid {
            verdict.with_subject(id.as_str(), &stored.subject_name)
        } else {
            verdict
        })
    }

    /// Verify a typed record.
    pub async fn verify_credential(&self, credential: &Credential) -> Result<Verdict, RegistryError> {
        let record = serde_json::to_value(credential).map_err(diploma_core::CoreError::from)?;
        self.verify(&record).await
    }

    fn signature_matches(&self, id: &CredentialId, presented: &Presented<'_>) -> bool {
        let fields = SignableFields::new(
            id.as_str(),
            presented.subject_name,
            presented.credential_title,
            presented.issued_at,
        );
        match fields.canonical_bytes() {
            Ok(payload) => self
                .registry
                .authority()
                .verify(&payload, &presented.signature),
            Err(_) => false,
        }
    }

    fn finish(&self, state: VerificationState, id: Option<&CredentialId>) -> Verdict {
        let id = id.map(CredentialId::as_str).unwrap_or("");
        tracing::debug!(credential_id = id, state = %state, "verification finished");
        Verdict::from_state(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::SigningAuthority;
    use crate::store::MemoryStore;
    use diploma_core::EngineConfig;
    use diploma_crypto::KeyPair;
    use std::sync::Arc;

    async fn setup() -> (CredentialVerifier, CredentialRegistry, Credential) {
        let registry = CredentialRegistry::new(
            Arc::new(MemoryStore::new()),
            SigningAuthority::new(Arc::new(KeyPair::generate())),
            EngineConfig::default(),
        );
        let issued = registry
            .issue("Alice", "BSc Physics", Utc::now())
            .await
            .unwrap();
        (CredentialVerifier::new(registry.clone()), registry, issued)
    }

    fn as_json(credential: &Credential) -> Value {
        serde_json::to_value(credential).unwrap()
    }

    #[tokio::test]
    async fn test_issued_credential_is_valid() {
        let (verifier, _, issued) = setup().await;
        let verdict = verifier.verify(&as_json(&issued)).await.unwrap();
        assert!(verdict.valid);
        assert_eq!(verdict.reason, "signature valid");
        assert_eq!(verdict.credential_id.as_deref(), Some(issued.id.as_str()));
        assert_eq!(verdict.subject_name.as_deref(), Some("Alice"));
    }

    #[tokio::test]
    async fn test_each_tampered_field_is_rejected() {
        let (verifier, _, issued) = setup().await;
        let tampers: [(&str, Value); 3] = [
            ("subject_name", "Mallory".into()),
            ("credential_title", "PhD Physics".into()),
            ("issued_at", "2001-01-01T00:00:00.000000Z".into()),
        ];
        for (field, value) in tampers {
            let mut record = as_json(&issued);
            record[field] = value;
            let verdict = verifier.verify(&record).await.unwrap();
            assert_eq!(verdict.state, VerificationState::SignatureInvalid, "{field}");
            assert!(verdict.subject_name.is_none());
        }
    }

    #[tokio::test]
    async fn test_respelled_timestamp_is_rejected() {
        let (verifier, _, issued) = setup().await;
        let canonical = format_timestamp(issued.issued_at);
        let stem = canonical.trim_end_matches('Z');
        let shifted = (issued.issued_at + chrono::Duration::hours(1))
            .format("%Y-%m-%dT%H:%M:%S%.6f+01:00")
            .to_string();

        for respelled in [
            format!("{stem}999Z"),
            format!("{stem}+00:00"),
            shifted,
            canonical.to_lowercase(),
        ] {
            let mut record = as_json(&issued);
            record["issued_at"] = respelled.clone().into();
            let verdict = verifier.verify(&record).await.unwrap();
            assert_eq!(verdict.state, VerificationState::SignatureInvalid, "{respelled}");
        }

        let mut record = as_json(&issued);
        record["issued_at"] = canonical.into();
        assert!(verifier.verify(&record).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_revoked_takes_precedence_over_signature() {
        let (verifier, registry, issued) = setup().await;
        registry.revoke(&issued.id).await.unwrap();

        let verdict = verifier.verify(&as_json(&issued)).await.unwrap();
        assert_eq!(verdict.state, VerificationState::Revoked);

        let mut forged = as_json(&issued);
        forged["signature"] = STANDARD.encode([7u8; 64]).into();
        let verdict = verifier.verify(&forged).await.unwrap();
        assert_eq!(verdict.state, VerificationState::Revoked);
        assert_eq!(verdict.reason, "revoked credential");
    }

    #[tokio::test]
    async fn test_presented_revoked_flag_is_ignored() {
        let (verifier, _, issued) = setup().await;
        let mut record = as_json(&issued);
        record["revoked"] = true.into();
        assert!(verifier.verify(&record).await.unwrap().valid);
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let (verifier, _, issued) = setup().await;
        let mut record = as_json(&issued);
        record["id"] = "00000000-0000-4000-8000-000000000000".into();
        let verdict = verifier.verify(&record).await.unwrap();
        assert_eq!(verdict.state, VerificationState::NotFound);
        assert_eq!(verdict.reason, "unknown credential");
    }

    #[tokio::test]
    async fn test_random_signature_bytes() {
        let (verifier, _, issued) = setup().await;
        let mut record = as_json(&issued);
        record["signature"] = STANDARD.encode(rand::random::<[u8; 32]>()).into();
        let verdict = verifier.verify(&record).await.unwrap();
        assert_eq!(verdict.reason, "invalid signature");
    }

    #[tokio::test]
    async fn test_undecodable_fields_are_signature_invalid() {
        let (verifier, _, issued) = setup().await;
        let breakages: [(&str, Value); 4] = [
            ("signature", "%%% not base64".into()),
            ("issued_at", "yesterday".into()),
            ("subject_name", 42.into()),
            ("credential_title", Value::Null),
        ];
        for (field, value) in breakages {
            let mut record = as_json(&issued);
            record[field] = value;
            let verdict = verifier.verify(&record).await.unwrap();
            assert_eq!(verdict.state, VerificationState::SignatureInvalid, "{field}");
        }

        let mut record = as_json(&issued);
        record.as_object_mut().unwrap().remove("signature");
        let verdict = verifier.verify(&record).await.unwrap();
        assert_eq!(verdict.state, VerificationState::SignatureInvalid);
    }

    #[tokio::test]
    async fn test_unreadable_input_is_malformed() {
        let (verifier, _, _) = setup().await;
        for input in [
            serde_json::json!([1, 2, 3]),
            serde_json::json!("credential"),
            serde_json::json!({}),
            serde_json::json!({"id": ""}),
            serde_json::json!({"id": 17}),
        ] {
            let verdict = verifier.verify(&input).await.unwrap();
            assert_eq!(verdict.state, VerificationState::Malformed, "{input}");
            assert!(!verdict.valid);
        }
    }

    #[tokio::test]
    async fn test_verify_never_mutates_registry() {
        let (verifier, registry, issued) = setup().await;
        let mut record = as_json(&issued);
        record["subject_name"] = "Mallory".into();
        verifier.verify(&record).await.unwrap();
        assert_eq!(registry.get(&issued.id).await.unwrap(), issued);
    }

    #[tokio::test]
    async fn test_verify_typed_record() {
        let (verifier, _, issued) = setup().await;
        assert!(verifier.verify_credential(&issued).await.unwrap().valid);
    }
}
