use std::sync::Arc;

use diploma_core::Credential;
use diploma_crypto::{sign, verify_bytes, CanonicalBytes, KeyPair, PublicKey, SignableFields};

use crate::error::RegistryError;

/// Signs and verifies canonical credential bytes with the issuing keypair.
///
/// Holds a shared, read-only reference to the keypair loaded at bootstrap;
/// safe to use from any number of tasks at once.
#[derive(Clone)]
pub struct SigningAuthority {
    keypair: Arc<KeyPair>,
    public_key: PublicKey,
}

impl SigningAuthority {
    pub fn new(keypair: Arc<KeyPair>) -> Self {
        let public_key = keypair.public_key();
        Self {
            keypair,
            public_key,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Deterministic Ed25519 signature over canonical bytes.
    pub fn sign(&self, payload: &CanonicalBytes) -> Vec<u8> {
        sign(payload.as_bytes(), &self.keypair).to_vec()
    }

    /// `true` only for a well-formed signature over exactly `payload`.
    pub fn verify(&self, payload: &CanonicalBytes, signature: &[u8]) -> bool {
        verify_bytes(payload.as_bytes(), signature, &self.public_key)
    }

    /// Canonicalize and sign a credential's signable fields.
    pub fn sign_fields(&self, fields: &SignableFields<'_>) -> Result<Vec<u8>, RegistryError> {
        Ok(self.sign(&fields.canonical_bytes()?))
    }

    /// Signature check of a full record, without any registry lookup.
    pub fn verify_credential(&self, credential: &Credential) -> bool {
        verify_credential_signature(credential, &self.public_key)
    }
}

/// Offline signature check against a published issuer key.
///
/// Says nothing about revocation; only the registry knows that.
pub fn verify_credential_signature(credential: &Credential, public_key: &PublicKey) -> bool {
    match SignableFields::from_credential(credential).canonical_bytes() {
        Ok(payload) => verify_bytes(payload.as_bytes(), &credential.signature, public_key),
        Err(_) => false,
    }
}
