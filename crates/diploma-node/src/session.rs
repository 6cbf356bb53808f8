//! Principals, password login and bearer sessions.
//!
//! Tokens are random 32-byte values handed to the client once. Only their
//! BLAKE3 digest is kept server side.

use dashmap::DashMap;
use rand::RngCore;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use diploma_core::{Claims, Principal};
use diploma_crypto::{hash_hex, hash_password, verify_password};

use crate::config::{SeedPrincipal, DEFAULT_REGISTRAR_PASSWORD};
use crate::storage::Storage;

/// A freshly issued bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_in: Duration,
}

struct Session {
    claims: Claims,
    expires_at: Instant,
}

/// In-memory session table keyed by token digest.
pub struct SessionManager {
    sessions: DashMap<String, Session>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl,
        }
    }

    /// Open a session for `claims` and return its token.
    pub fn create(&self, claims: Claims) -> IssuedToken {
        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = hex::encode(raw);
        self.sessions.insert(
            hash_hex(token.as_bytes()),
            Session {
                claims,
                expires_at: Instant::now() + self.ttl,
            },
        );
        IssuedToken {
            token,
            expires_in: self.ttl,
        }
    }

    /// Claims behind a live token. Expired sessions are dropped on sight.
    pub fn resolve(&self, token: &str) -> Option<Claims> {
        let key = hash_hex(token.as_bytes());
        let claims = {
            let session = self.sessions.get(&key)?;
            (session.expires_at > Instant::now()).then(|| session.claims.clone())
        };
        if claims.is_none() {
            self.sessions.remove(&key);
        }
        claims
    }

    /// Drop every expired session; returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        before - self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Check a username/password pair against the stored principal.
///
/// Unknown users and wrong passwords are indistinguishable to the caller:
/// both cost one argon2 verification.
pub fn authenticate(storage: &Storage, username: &str, password: &str) -> anyhow::Result<Option<Claims>> {
    let Some(principal) = storage.get_principal(username)? else {
        if let Some(decoy) = decoy_hash() {
            verify_password(password.as_bytes(), decoy).ok();
        }
        return Ok(None);
    };
    if verify_password(password.as_bytes(), &principal.credential_hash)? {
        Ok(Some(principal.claims()))
    } else {
        Ok(None)
    }
}

/// PHC string verified against on the unknown-user path. Hashed once, with
/// the same parameters as real principals.
fn decoy_hash() -> Option<&'static str> {
    static DECOY: OnceLock<Option<String>> = OnceLock::new();
    DECOY
        .get_or_init(|| hash_password(b"diploma-unknown-principal").ok())
        .as_deref()
}

/// Create configured principals that do not exist yet. Existing records,
/// including their passwords, are left alone.
pub fn seed_principals(storage: &Storage, seeds: &[SeedPrincipal]) -> anyhow::Result<usize> {
    let mut created = 0;
    for seed in seeds {
        if storage.get_principal(&seed.username)?.is_some() {
            continue;
        }
        let principal = Principal {
            username: seed.username.clone(),
            role: seed.role,
            credential_hash: hash_password(seed.password.as_bytes())?,
        };
        if storage.insert_principal(&principal)? {
            if seed.password == DEFAULT_REGISTRAR_PASSWORD {
                tracing::warn!(username = %seed.username, "principal seeded with the default password");
            }
            tracing::info!(username = %seed.username, role = %seed.role, "principal created");
            created += 1;
        }
    }
    Ok(created)
}
