//! Integration test: the issuing key persists across engine restarts.

use std::sync::Arc;

use diploma_crypto::KeyPair;
use diploma_integration_tests::{file_engine, presented, registrar, scratch_dir};
use diploma_registry::{verify_credential_signature, MemoryStore};

#[tokio::test]
async fn test_credentials_verify_after_restart() {
    let dir = scratch_dir("restart");
    let key_path = dir.join("issuer_key.json");
    let store = Arc::new(MemoryStore::new());

    let issued = {
        let engine = file_engine(&key_path, store.clone());
        engine.issue(&registrar(), "Alice", "BSc").await.unwrap()
    };

    let restarted = file_engine(&key_path, store);
    assert!(restarted.verify(&presented(&issued)).await.unwrap().valid);
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_offline_check_with_published_key() {
    let dir = scratch_dir("offline");
    let engine = file_engine(&dir.join("issuer_key.json"), Arc::new(MemoryStore::new()));
    let issued = engine.issue(&registrar(), "Alice", "BSc").await.unwrap();

    let published = engine.public_key().to_hex();
    let public_key = diploma_crypto::PublicKey::from_hex(&published).unwrap();
    assert!(verify_credential_signature(&issued, &public_key));

    let stranger = KeyPair::generate().public_key();
    assert!(!verify_credential_signature(&issued, &stranger));
    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_foreign_key_cannot_vouch_for_records() {
    let store = Arc::new(MemoryStore::new());
    let a = scratch_dir("key-a");
    let b = scratch_dir("key-b");

    let issuer_a = file_engine(&a.join("k.json"), store.clone());
    let issuer_b = file_engine(&b.join("k.json"), store);
    let issued = issuer_a.issue(&registrar(), "Alice", "BSc").await.unwrap();

    let verdict = issuer_b.verify(&presented(&issued)).await.unwrap();
    assert!(!verdict.valid);
    assert_eq!(verdict.reason, "invalid signature");

    std::fs::remove_dir_all(&a).ok();
    std::fs::remove_dir_all(&b).ok();
}
