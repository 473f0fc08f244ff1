//! Prelude module for convenient imports.
//!
//! ```rust
//! use clmm_rebalancer_domain::prelude::*;
//! ```

pub use crate::config::{
    ConfigError, GlobalConfig, PoolConfig, RetryConfig, SkimConfig, SkimThresholds, TokenInfo,
};
pub use crate::entities::{
    FeesCollected, NewPosition, NewRebalance, Position, PriceSnapshot, Rebalance, SkimEntry,
    SkimWalletStatus,
};
pub use crate::enums::{CloseReason, PositionStatus, RangeMode, SkimAsset, TriggerReason};
pub use crate::error::MathError;
pub use crate::math::range::{
    RangeDistances, compute_range, is_in_range, range_distances, should_trigger_rebalance,
};
pub use crate::math::skim::{DEFAULT_USDC_SHARE, SkimAmount, SkimSplit, compute_skim};
pub use crate::value_objects::price_range::PriceRange;
