use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A closed price interval `[lower, upper]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    pub lower: Decimal,
    pub upper: Decimal,
}

impl PriceRange {
    pub fn new(lower: Decimal, upper: Decimal) -> Self {
        Self { lower, upper }
    }

    pub fn width(&self) -> Decimal {
        self.upper - self.lower
    }

    pub fn contains(&self, price: Decimal) -> bool {
        price >= self.lower && price <= self.upper
    }

    /// True when the interval has no width or is inverted.
    pub fn is_degenerate(&self) -> bool {
        self.upper <= self.lower
    }
}
