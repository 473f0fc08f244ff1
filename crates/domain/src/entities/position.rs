use crate::enums::{CloseReason, PositionStatus};
use crate::value_objects::price_range::PriceRange;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A tracked liquidity position.
///
/// Bounds never change after creation; a new range is always a new row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub id: i64,
    pub pool_id: String,
    /// Identifier assigned by the AMM protocol.
    pub position_id: String,

    pub tick_lower: i32,
    pub tick_upper: i32,
    pub range: PriceRange,

    pub liquidity: u128,
    pub amount_a: u64,
    pub amount_b: u64,

    pub entry_price: Decimal,
    pub entry_value_usd: Decimal,

    pub status: PositionStatus,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub close_reason: Option<CloseReason>,
}

impl Position {
    pub fn is_active(&self) -> bool {
        self.status == PositionStatus::Active
    }
}

/// Fields supplied when a position is first recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPosition {
    pub pool_id: String,
    pub position_id: String,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub range: PriceRange,
    pub liquidity: u128,
    pub amount_a: u64,
    pub amount_b: u64,
    pub entry_price: Decimal,
    pub entry_value_usd: Decimal,
}
