use crate::enums::TriggerReason;
use crate::math::skim::SkimAmount;
use crate::value_objects::price_range::PriceRange;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Fees harvested when a position is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeesCollected {
    /// Raw token A amount.
    pub amount_a: u64,
    /// Raw token B amount.
    pub amount_b: u64,
    pub usd: Decimal,
}

/// A completed close-and-reopen cycle. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rebalance {
    pub id: i64,
    pub pool_id: String,
    pub old_position_id: i64,
    pub new_position_id: i64,
    pub trigger_price: Decimal,
    pub trigger_reason: TriggerReason,
    pub old_range: PriceRange,
    pub new_range: PriceRange,
    pub fees: FeesCollected,
    pub skim: SkimAmount,
    /// Gas in native token units.
    pub gas_used: Decimal,
    pub tx_digest: String,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRebalance {
    pub pool_id: String,
    pub old_position_id: i64,
    pub new_position_id: i64,
    pub trigger_price: Decimal,
    pub trigger_reason: TriggerReason,
    pub old_range: PriceRange,
    pub new_range: PriceRange,
    pub fees: FeesCollected,
    pub skim: SkimAmount,
    pub gas_used: Decimal,
    pub tx_digest: String,
}
