// src/key_pool.rs

use parking_lot::Mutex;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("no API credentials configured for this provider")]
    NoCredentialsConfigured,
}

/// Rotating pool of upstream API credentials shared by all concurrent
/// requests for one provider.
///
/// The key list is fixed at construction; only the rotation cursor and
/// the quarantine set mutate. Both live behind a single short-lived
/// mutex that is never held across an await point, so interleaved
/// requests can at worst duplicate an attempt, never corrupt state.
#[derive(Debug)]
pub struct KeyPool {
    keys: Vec<String>,
    state: Mutex<PoolState>,
}

#[derive(Debug, Default)]
struct PoolState {
    cursor: usize,
    quarantined: HashSet<String>,
}

impl KeyPool {
    /// Builds a pool from configured credentials. Blank entries are
    /// dropped and duplicates removed, preserving first-seen order.
    pub fn new(keys: Vec<String>) -> Self {
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && seen.insert(k.clone()))
            .collect();
        Self {
            keys,
            state: Mutex::new(PoolState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn quarantined_count(&self) -> usize {
        self.state.lock().quarantined.len()
    }

    /// Returns the next usable credential.
    ///
    /// When every key is quarantined the pool resets itself (quotas are
    /// time-windowed upstream and may have recovered); this is the only
    /// way a key re-enters rotation. For a non-empty pool this always
    /// returns a key.
    pub fn select_key(&self) -> Result<String, PoolError> {
        if self.keys.is_empty() {
            return Err(PoolError::NoCredentialsConfigured);
        }

        let mut state = self.state.lock();
        if state.quarantined.len() >= self.keys.len() {
            warn!(
                pool_size = self.keys.len(),
                "all keys quarantined; resetting pool"
            );
            state.quarantined.clear();
            state.cursor = 0;
        }

        for i in 0..self.keys.len() {
            let idx = (state.cursor + i) % self.keys.len();
            let key = &self.keys[idx];
            if !state.quarantined.contains(key) {
                debug!(key.preview = %key_preview(key), index = idx, "selected key");
                return Ok(key.clone());
            }
        }

        // One full sweep found nothing (only reachable through an
        // interleaved mark_failed); fall back to the first key.
        Ok(self.keys[0].clone())
    }

    /// Quarantines a credential after an auth/quota/rate-limit failure
    /// and advances the cursor so the next selection prefers a
    /// different key. Unknown keys are ignored.
    pub fn mark_failed(&self, key: &str) {
        if !self.keys.iter().any(|k| k == key) {
            return;
        }
        let mut state = self.state.lock();
        state.quarantined.insert(key.to_string());
        state.cursor = (state.cursor + 1) % self.keys.len();
        warn!(
            key.preview = %key_preview(key),
            quarantined = state.quarantined.len(),
            pool_size = self.keys.len(),
            "key quarantined"
        );
    }
}

/// Short preview of a credential safe for logs.
pub fn key_preview(key: &str) -> String {
    if key.len() > 8 {
        format!("{}...{}", &key[..4], &key[key.len() - 4..])
    } else {
        key.to_string()
    }
}
