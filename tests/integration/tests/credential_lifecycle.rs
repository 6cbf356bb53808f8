//! Integration test: issue → verify → revoke across crates.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use diploma_core::{CredentialId, VerificationState};
use diploma_crypto::SignableFields;
use diploma_integration_tests::{memory_engine, presented, registrar};

#[tokio::test]
async fn test_issued_credential_verifies() {
    let engine = memory_engine();
    let issued = engine
        .issue(&registrar(), "Alice", "BSc Physics")
        .await
        .expect("issuance should succeed");

    let verdict = engine.verify(&presented(&issued)).await.unwrap();
    assert!(verdict.valid);
    assert_eq!(verdict.state, VerificationState::Valid);
    assert_eq!(verdict.credential_id.as_deref(), Some(issued.id.as_str()));
}

#[tokio::test]
async fn test_alice_scenario_valid_then_revoked() {
    let engine = memory_engine();
    let issued = engine
        .issue(&registrar(), "Alice", "BSc Physics")
        .await
        .unwrap();
    let record = presented(&issued);

    assert!(engine.verify(&record).await.unwrap().valid);

    engine.revoke(&registrar(), &issued.id).await.unwrap();
    let verdict = engine.verify(&record).await.unwrap();
    assert!(!verdict.valid);
    assert_eq!(verdict.state, VerificationState::Revoked);
    assert!(verdict.reason.contains("revoked"));
}

#[tokio::test]
async fn test_unknown_id_scenario() {
    let engine = memory_engine();
    let issued = engine.issue(&registrar(), "Alice", "BSc").await.unwrap();
    let mut record = presented(&issued);
    record["id"] = CredentialId::generate().to_string().into();

    let verdict = engine.verify(&record).await.unwrap();
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "unknown credential");
}

#[tokio::test]
async fn test_random_signature_scenario() {
    let engine = memory_engine();
    let issued = engine.issue(&registrar(), "Alice", "BSc").await.unwrap();
    let mut record = presented(&issued);
    record["signature"] = STANDARD.encode(rand::random::<[u8; 32]>()).into();

    let verdict = engine.verify(&record).await.unwrap();
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "invalid signature");
}

#[tokio::test]
async fn test_tampering_any_signed_field_is_detected() {
    let engine = memory_engine();
    let issued = engine
        .issue(&registrar(), "Alice", "BSc Physics")
        .await
        .unwrap();

    for (field, value) in [
        ("subject_name", "Alicia"),
        ("credential_title", "BSc Physics (Honours)"),
        ("issued_at", "1999-12-31T23:59:59.000000Z"),
    ] {
        let mut record = presented(&issued);
        record[field] = value.into();
        let verdict = engine.verify(&record).await.unwrap();
        assert_eq!(verdict.state, VerificationState::SignatureInvalid, "{field}");
    }
}

#[tokio::test]
async fn test_revocation_is_idempotent_and_preserves_record() {
    let engine = memory_engine();
    let issued = engine.issue(&registrar(), "Alice", "BSc").await.unwrap();

    engine.revoke(&registrar(), &issued.id).await.unwrap();
    let once = engine.get(&registrar(), &issued.id).await.unwrap();
    engine.revoke(&registrar(), &issued.id).await.unwrap();
    let twice = engine.get(&registrar(), &issued.id).await.unwrap();

    assert_eq!(once, twice);
    assert!(twice.revoked);
    assert_eq!(twice.signature, issued.signature);
    assert_eq!(twice.issued_at, issued.issued_at);
}

#[tokio::test]
async fn test_canonical_bytes_agree_across_instances() {
    let engine = memory_engine();
    let issued = engine.issue(&registrar(), "Alice", "BSc").await.unwrap();

    let from_record = SignableFields::from_credential(&issued)
        .canonical_bytes()
        .unwrap();
    let rebuilt = SignableFields::new(
        issued.id.as_str(),
        "Alice",
        "BSc",
        issued.issued_at,
    )
    .canonical_bytes()
    .unwrap();
    let reparsed: diploma_core::Credential =
        serde_json::from_value(presented(&issued)).unwrap();
    let from_wire = SignableFields::from_credential(&reparsed)
        .canonical_bytes()
        .unwrap();

    assert_eq!(from_record, rebuilt);
    assert_eq!(from_record, from_wire);
}

#[tokio::test]
async fn test_concurrent_issuance_yields_distinct_valid_records() {
    let engine = memory_engine();
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .issue(&registrar(), &format!("student-{i}"), "BSc")
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut ids = Vec::new();
    for handle in handles {
        let issued = handle.await.unwrap();
        assert!(engine.verify(&presented(&issued)).await.unwrap().valid);
        ids.push(issued.id);
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 16);
    let listed = engine.list(&registrar()).unwrap().collect_all().await.unwrap();
    assert_eq!(listed.len(), 16);
}

#[tokio::test]
async fn test_listing_spans_pages_and_restarts() {
    let engine = memory_engine();
    for i in 0..250 {
        let subject = if i % 5 == 0 { "alice" } else { "bob" };
        engine.issue(&registrar(), subject, "BSc").await.unwrap();
    }

    let mut cursor = engine.list(&registrar()).unwrap();
    let mut first = Vec::new();
    while let Some(credential) = cursor.next().await.unwrap() {
        first.push(credential.id);
    }
    assert_eq!(first.len(), 250);
    assert!(first.windows(2).all(|w| w[0] < w[1]));

    cursor.restart();
    let again: Vec<_> = cursor
        .collect_all()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(first, again);

    let alice = engine
        .list(&diploma_core::Claims::holder("alice"))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(alice.len(), 50);
}
