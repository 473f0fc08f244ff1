use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest observed price for a pool, measured against its active position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub pool_id: String,
    pub price: Decimal,
    pub in_range: bool,
    /// Percent of range width from price to the lower edge.
    pub distance_to_lower: Decimal,
    /// Percent of range width from price to the upper edge.
    pub distance_to_upper: Decimal,
    /// Name of the price source that answered.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}
