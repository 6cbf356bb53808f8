use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

use diploma_core::{Claims, Credential, CredentialId, EngineConfig, Verdict};
use diploma_crypto::{KeyPair, PublicKey};

use crate::authority::SigningAuthority;
use crate::error::RegistryError;
use crate::gate::{authorize, Decision, Operation};
use crate::registry::{CredentialCursor, CredentialRegistry, ListFilter};
use crate::store::CredentialStore;
use crate::verifier::CredentialVerifier;

/// Caller-facing credential engine.
///
/// Every operation except [`verify`](Self::verify) takes the caller's
/// trusted claims and passes them through the authorization gate first.
#[derive(Clone)]
pub struct Engine {
    registry: CredentialRegistry,
    verifier: CredentialVerifier,
}

impl Engine {
    pub fn new(keypair: Arc<KeyPair>, store: Arc<dyn CredentialStore>, config: EngineConfig) -> Self {
        let registry = CredentialRegistry::new(store, SigningAuthority::new(keypair), config);
        let verifier = CredentialVerifier::new(registry.clone());
        Self { registry, verifier }
    }

    pub fn public_key(&self) -> &PublicKey {
        self.registry.authority().public_key()
    }

    pub fn registry(&self) -> &CredentialRegistry {
        &self.registry
    }

    pub async fn issue(
        &self,
        claims: &Claims,
        subject_name: &str,
        credential_title: &str,
    ) -> Result<Credential, RegistryError> {
        self.issue_at(claims, subject_name, credential_title, Utc::now())
            .await
    }

    /// Issue with an explicit issuance time.
    pub async fn issue_at(
        &self,
        claims: &Claims,
        subject_name: &str,
        credential_title: &str,
        issued_at: DateTime<Utc>,
    ) -> Result<Credential, RegistryError> {
        authorize(claims, &Operation::Issue)?;
        self.registry
            .issue(subject_name, credential_title, issued_at)
            .await
    }

    pub async fn get(&self, claims: &Claims, id: &CredentialId) -> Result<Credential, RegistryError> {
        let credential = self.registry.get(id).await?;
        authorize(claims, &Operation::Get(&credential))?;
        Ok(credential)
    }

    /// Start a lazy listing scoped to what the caller may see.
    pub fn list(&self, claims: &Claims) -> Result<CredentialCursor, RegistryError> {
        let filter = match authorize(claims, &Operation::List)? {
            Decision::AllowFiltered(filter) => filter,
            _ => ListFilter::All,
        };
        Ok(self.registry.list(filter))
    }

    pub async fn revoke(&self, claims: &Claims, id: &CredentialId) -> Result<(), RegistryError> {
        authorize(claims, &Operation::Revoke(id))?;
        self.registry.revoke(id).await
    }

    /// Verify a presented record. Open to anyone, authenticated or not.
    pub async fn verify(&self, record: &Value) -> Result<Verdict, RegistryError> {
        self.verifier.verify(record).await
    }
}
