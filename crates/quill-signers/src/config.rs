//! Session configuration

use serde::{Deserialize, Serialize};

/// Number of addresses derived into the cache when a session opens.
pub const DEFAULT_ADDRESS_CACHE_SIZE: usize = 10;

/// Configuration for a signing session.
///
/// Passed explicitly to session constructors; there is no global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// How many account indices to derive at session open
    #[serde(default = "default_cache_size")]
    pub address_cache_size: usize,
}

fn default_cache_size() -> usize {
    DEFAULT_ADDRESS_CACHE_SIZE
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            address_cache_size: DEFAULT_ADDRESS_CACHE_SIZE,
        }
    }
}
