//! Per-pool in-flight guard around position opening.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Set of pools with an open in progress.
#[derive(Debug, Clone, Default)]
pub struct InFlightPools {
    pools: Arc<Mutex<HashSet<String>>>,
}

impl InFlightPools {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.pools.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims the pool. `None` when another caller holds it.
    pub fn try_acquire(&self, pool_id: &str) -> Option<InFlightGuard> {
        if !self.lock().insert(pool_id.to_string()) {
            return None;
        }
        Some(InFlightGuard {
            pools: self.pools.clone(),
            pool_id: pool_id.to_string(),
        })
    }

    pub fn is_held(&self, pool_id: &str) -> bool {
        self.lock().contains(pool_id)
    }
}

/// Releases the pool on drop, including on early return.
#[derive(Debug)]
pub struct InFlightGuard {
    pools: Arc<Mutex<HashSet<String>>>,
    pool_id: String,
}

impl InFlightGuard {
    pub fn pool_id(&self) -> &str {
        &self.pool_id
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.pools
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.pool_id);
    }
}
