use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for the credential engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on a single persistent-store round trip, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,
    /// How many fresh ids issuance tries before giving up on collisions.
    #[serde(default = "default_id_attempts")]
    pub id_attempts: u32,
    /// Records fetched per store round trip when walking a listing.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: usize,
}

fn default_store_timeout_ms() -> u64 {
    2_000
}
fn default_id_attempts() -> u32 {
    3
}
fn default_list_page_size() -> usize {
    100
}

impl EngineConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            id_attempts: default_id_attempts(),
            list_page_size: default_list_page_size(),
        }
    }
}
