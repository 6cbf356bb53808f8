//! The diploma node orchestrator.
//!
//! Bootstraps the issuing keypair, storage, principals and the credential
//! engine, then serves the HTTP API in a background task.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use diploma_crypto::PublicKey;
use diploma_registry::{Engine, FileKeyBackend, KeyStore};

use crate::config::DiplomaConfig;
use crate::session::{seed_principals, SessionManager};
use crate::state::NodeState;
use crate::storage::{RocksStore, Storage};

/// How often expired sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct DiplomaNode {
    config: DiplomaConfig,
    state: Arc<NodeState>,
    api_task: Option<JoinHandle<()>>,
}

impl DiplomaNode {
    /// Load or create the keypair, open storage and seed principals.
    ///
    /// Fails if the persisted keypair cannot be used.
    pub fn new(config: DiplomaConfig) -> Result<Self> {
        let key_path = config.keypair_path();
        let keypair = KeyStore::new(FileKeyBackend::new(&key_path))
            .load_or_create()
            .with_context(|| format!("issuing key at {}", key_path.display()))?;

        let storage = Arc::new(Storage::open(&config.db_path())?);
        tracing::info!(path = %config.db_path().display(), "storage initialized");

        let created = seed_principals(&storage, &config.auth.principals)?;
        if created > 0 {
            tracing::info!(count = created, "seeded principals");
        }

        let engine = Engine::new(
            keypair,
            Arc::new(RocksStore::new(storage.clone())),
            config.engine.clone(),
        );
        let sessions = SessionManager::new(config.auth.session_ttl());
        let state = Arc::new(NodeState::new(engine, sessions, storage));

        tracing::info!(public_key = %state.engine.public_key(), "diploma node created");

        Ok(Self {
            config,
            state,
            api_task: None,
        })
    }

    /// Spawn the HTTP API server.
    pub async fn start(&mut self) -> Result<()> {
        let api_addr: SocketAddr = self.config.api_addr().parse()?;
        let api_state = self.state.clone();
        self.api_task = Some(tokio::spawn(async move {
            if let Err(e) = crate::api::start_api_server(api_addr, api_state).await {
                tracing::error!(error = %e, "HTTP API server error");
            }
        }));
        Ok(())
    }

    /// Housekeeping loop; returns when the API server stops.
    pub async fn run(&mut self) -> Result<()> {
        let mut api_task = self
            .api_task
            .take()
            .ok_or_else(|| anyhow::anyhow!("node not started"))?;
        let mut sweep = tokio::time::interval(SESSION_SWEEP_INTERVAL);

        loop {
            tokio::select! {
                _ = sweep.tick() => {
                    let purged = self.state.sessions.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, "expired sessions removed");
                    }
                }
                result = &mut api_task => {
                    if let Err(e) = result {
                        tracing::error!(error = %e, "API task failed");
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        tracing::info!("shutting down diploma node");
        if let Some(task) = self.api_task.take() {
            task.abort();
        }
        tracing::info!("diploma node shut down");
        Ok(())
    }

    pub fn public_key(&self) -> &PublicKey {
        self.state.engine.public_key()
    }

    pub fn state(&self) -> &Arc<NodeState> {
        &self.state
    }
}
