//! Rebalancing engine for concentrated-liquidity positions.
//!
//! This crate holds everything that acts on the chain or the store:
//! - Price monitoring with an ordered list of price sources
//! - The pure rebalance decision
//! - Position opening, closing and close-then-reopen rebalancing
//! - Profit skimming and deposit alerts
//! - Per-pool pause and failure tracking
//! - The polling orchestrator and its operator operations
//! - Operator notifications

/// Prelude module for convenient imports.
pub mod prelude;

/// Operator notifications.
pub mod alerts;
/// Per-pool pause and failure tracking.
pub mod emergency;
/// Execution errors.
pub mod error;
/// Price monitoring.
pub mod monitor;
/// Polling control loop.
pub mod orchestrator;
/// Position lifecycle.
pub mod position;
/// Profit skimming.
pub mod skim;
/// Rebalance decisions.
pub mod strategy;

#[cfg(test)]
mod testing;
