//! Per-pool pause flags, failure counters and rebalance timestamps.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{error, info};

/// Process-local runtime state for one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolRuntimeState {
    /// Automated actions are suspended while set.
    pub paused: bool,
    pub pause_reason: Option<String>,
    /// Failed cycles since the last success.
    pub consecutive_failures: u32,
    /// Last confirmed rebalance.
    pub last_rebalance_at: Option<DateTime<Utc>>,
}

impl PoolRuntimeState {
    /// Whether `min_interval` has passed since the last confirmed rebalance.
    pub fn interval_elapsed(&self, min_interval: Duration, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_rebalance_at else {
            return true;
        };
        let elapsed = (now - last).to_std().unwrap_or(Duration::ZERO);
        elapsed >= min_interval
    }

    /// Counts a failure. Returns true when this failure reached `max_failures`
    /// and paused the pool.
    pub fn record_failure(&mut self, max_failures: u32) -> bool {
        self.consecutive_failures += 1;
        if !self.paused && self.consecutive_failures >= max_failures {
            self.paused = true;
            self.pause_reason = Some(format!(
                "{} consecutive failures",
                self.consecutive_failures
            ));
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    pub fn pause(&mut self, reason: impl Into<String>) {
        self.paused = true;
        self.pause_reason = Some(reason.into());
    }

    /// Clears the pause and the failure counter.
    pub fn resume(&mut self) {
        self.paused = false;
        self.pause_reason = None;
        self.consecutive_failures = 0;
    }
}

/// Registry of [`PoolRuntimeState`] keyed by pool id.
#[derive(Debug, Clone, Default)]
pub struct PoolStates {
    states: Arc<RwLock<HashMap<String, PoolRuntimeState>>>,
}

impl PoolStates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state of the pool, default when never touched.
    pub async fn get(&self, pool_id: &str) -> PoolRuntimeState {
        self.states
            .read()
            .await
            .get(pool_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn all(&self) -> HashMap<String, PoolRuntimeState> {
        self.states.read().await.clone()
    }

    pub async fn is_paused(&self, pool_id: &str) -> bool {
        self.states
            .read()
            .await
            .get(pool_id)
            .is_some_and(|s| s.paused)
    }

    /// Records a confirmed rebalance time.
    pub async fn record_rebalance(&self, pool_id: &str, at: DateTime<Utc>) {
        let mut states = self.states.write().await;
        let state = states.entry(pool_id.to_string()).or_default();
        if state.last_rebalance_at.is_none_or(|last| last < at) {
            state.last_rebalance_at = Some(at);
        }
    }

    pub async fn record_success(&self, pool_id: &str) {
        self.states
            .write()
            .await
            .entry(pool_id.to_string())
            .or_default()
            .record_success();
    }

    /// Counts a failure; true when it paused the pool.
    pub async fn record_failure(&self, pool_id: &str, max_failures: u32) -> bool {
        let mut states = self.states.write().await;
        let state = states.entry(pool_id.to_string()).or_default();
        let paused = state.record_failure(max_failures);
        if paused {
            error!(
                pool = pool_id,
                failures = state.consecutive_failures,
                critical = true,
                "Pool auto-paused"
            );
        }
        paused
    }

    /// Pauses the pool. Returns false when it was already paused.
    pub async fn pause(&self, pool_id: &str, reason: &str) -> bool {
        let mut states = self.states.write().await;
        let state = states.entry(pool_id.to_string()).or_default();
        if state.paused {
            return false;
        }
        state.pause(reason);
        info!(pool = pool_id, reason, "Pool paused");
        true
    }

    /// Resumes the pool. Returns false when it was not paused.
    pub async fn resume(&self, pool_id: &str) -> bool {
        let mut states = self.states.write().await;
        let state = states.entry(pool_id.to_string()).or_default();
        if !state.paused {
            return false;
        }
        state.resume();
        info!(pool = pool_id, "Pool resumed");
        true
    }
}
