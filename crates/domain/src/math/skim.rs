//! Profit skim computation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Share of every skim taken as USDC; the remainder goes to the native token.
pub const DEFAULT_USDC_SHARE: Decimal = Decimal::from_parts(7, 0, 0, false, 1);

/// Allocation of a skim between USDC and the native token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkimSplit {
    pub usdc_share: Decimal,
}

impl SkimSplit {
    pub fn new(usdc_share: Decimal) -> Self {
        Self { usdc_share }
    }

    pub fn native_share(&self) -> Decimal {
        Decimal::ONE - self.usdc_share
    }
}

impl Default for SkimSplit {
    fn default() -> Self {
        Self::new(DEFAULT_USDC_SHARE)
    }
}

/// Skim amounts owed to the secondary wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SkimAmount {
    pub usdc_equivalent: Decimal,
    pub native_equivalent: Decimal,
}

impl SkimAmount {
    pub const ZERO: Self = Self {
        usdc_equivalent: Decimal::ZERO,
        native_equivalent: Decimal::ZERO,
    };

    pub fn is_zero(&self) -> bool {
        self.usdc_equivalent <= Decimal::ZERO && self.native_equivalent <= Decimal::ZERO
    }

    pub fn total(&self) -> Decimal {
        self.usdc_equivalent + self.native_equivalent
    }
}

/// Computes the skim on realized profit.
///
/// `profit = (curr - prev) + fees`; no skim when profit is not positive.
pub fn compute_skim(
    prev_value_usd: Decimal,
    curr_value_usd: Decimal,
    fees_usd: Decimal,
    skim_pct: Decimal,
    split: SkimSplit,
) -> SkimAmount {
    let profit = (curr_value_usd - prev_value_usd) + fees_usd;
    if profit <= Decimal::ZERO {
        return SkimAmount::ZERO;
    }
    let skim = profit * skim_pct;
    SkimAmount {
        usdc_equivalent: skim * split.usdc_share,
        native_equivalent: skim * split.native_share(),
    }
}
