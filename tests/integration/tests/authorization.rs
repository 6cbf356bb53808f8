//! Integration test: role-based access across engine operations.

use diploma_core::{Claims, CredentialId};
use diploma_integration_tests::{memory_engine, presented, registrar};
use diploma_registry::RegistryError;

#[tokio::test]
async fn test_holder_reads_own_but_not_others() {
    let engine = memory_engine();
    let own = engine.issue(&registrar(), "alice", "BSc").await.unwrap();
    let other = engine.issue(&registrar(), "bob", "MSc").await.unwrap();
    let alice = Claims::holder("alice");

    assert_eq!(engine.get(&alice, &own.id).await.unwrap(), own);
    assert!(matches!(
        engine.get(&alice, &other.id).await,
        Err(RegistryError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_holder_listing_is_prefiltered() {
    let engine = memory_engine();
    for subject in ["alice", "bob", "alice", "carol"] {
        engine.issue(&registrar(), subject, "BSc").await.unwrap();
    }

    let alice = engine
        .list(&Claims::holder("alice"))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(alice.len(), 2);
    assert!(alice.iter().all(|c| c.subject_name == "alice"));
    let all = engine.list(&registrar()).unwrap().collect_all().await.unwrap();
    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_holder_mutations_are_denied_before_the_registry() {
    let engine = memory_engine();
    let alice = Claims::holder("alice");

    assert!(matches!(
        engine.issue(&alice, "alice", "PhD").await,
        Err(RegistryError::Forbidden(_))
    ));
    let mut listing = engine.list(&registrar()).unwrap();
    assert!(listing.next().await.unwrap().is_none());

    // Denied even for ids that do not exist: the gate runs first.
    assert!(matches!(
        engine
            .revoke(&alice, &CredentialId::new("nope").unwrap())
            .await,
        Err(RegistryError::Forbidden(_))
    ));
}

#[tokio::test]
async fn test_verification_needs_no_claims() {
    let engine = memory_engine();
    let issued = engine.issue(&registrar(), "alice", "BSc").await.unwrap();
    assert!(engine.verify(&presented(&issued)).await.unwrap().valid);
}

#[tokio::test]
async fn test_second_issuer_has_full_access() {
    let engine = memory_engine();
    let issued = engine.issue(&registrar(), "alice", "BSc").await.unwrap();
    let dean = Claims::issuer("dean");
    assert_eq!(engine.get(&dean, &issued.id).await.unwrap(), issued);
    engine.revoke(&dean, &issued.id).await.unwrap();
    assert!(engine.get(&dean, &issued.id).await.unwrap().revoked);
}
