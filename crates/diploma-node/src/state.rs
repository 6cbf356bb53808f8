//! Shared node state, accessible from HTTP handlers.

use std::sync::Arc;
use std::time::Instant;

use diploma_registry::Engine;

use crate::session::SessionManager;
use crate::storage::Storage;

pub struct NodeState {
    /// The credential engine.
    pub engine: Engine,
    /// Login sessions.
    pub sessions: SessionManager,
    /// Backing store, for principal lookups at login.
    pub storage: Arc<Storage>,
    /// When the node started.
    pub start_time: Instant,
}

impl NodeState {
    pub fn new(engine: Engine, sessions: SessionManager, storage: Arc<Storage>) -> Self {
        Self {
            engine,
            sessions,
            storage,
            start_time: Instant::now(),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
