//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types from the crate.
//!
//! # Example
//!
//! ```rust
//! use clmm_rebalancer_execution::prelude::*;
//! ```

// Alerts
pub use crate::alerts::{
    LogNotifier, MultiNotifier, Notification, Notifier, RebalanceSummary, TelegramNotifier,
    notify_quietly,
};

// Emergency
pub use crate::emergency::{PoolRuntimeState, PoolStates};

// Errors
pub use crate::error::ExecutionError;

// Monitor
pub use crate::monitor::{OracleSource, PoolSpotSource, PriceMonitor, PriceSource};

// Orchestrator
pub use crate::orchestrator::{Boundaries, CycleReport, Orchestrator, PoolMetrics, PoolOutcome};

// Position
pub use crate::position::{
    CloseOutcome, InFlightGuard, InFlightPools, OpenedPosition, PositionManager,
    PositionManagerConfig, RebalanceResult, RebalanceStatus,
};

// Skim
pub use crate::skim::SkimManager;

// Strategy
pub use crate::strategy::{Decision, StrategyEngine};
