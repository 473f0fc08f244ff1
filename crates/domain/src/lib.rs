//! Domain model for the concentrated-liquidity rebalancer.
//!
//! Pure types and math: pool configuration, positions, rebalances,
//! price snapshots, skim accounting and the range/tick/liquidity
//! functions the decision engine is built on. Nothing here performs I/O.

/// Pool and process configuration.
pub mod config;
/// Persisted entities.
pub mod entities;
/// Enumerated states and reasons.
pub mod enums;
/// Math error type.
pub mod error;
/// Range, tick, liquidity and skim math.
pub mod math;
/// Value objects.
pub mod value_objects;

/// Prelude module for convenient imports.
pub mod prelude;
