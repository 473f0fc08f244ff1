use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One skim ledger row. Amounts are in token units (not base units).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkimEntry {
    pub pool_id: String,
    pub rebalance_id: Option<i64>,
    pub usdc_amount: Decimal,
    pub native_amount: Decimal,
    pub tx_digest: Option<String>,
}

/// Running skim-wallet balances against their deposit thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkimWalletStatus {
    pub usdc_balance: Decimal,
    pub native_balance: Decimal,
    pub usdc_threshold: Decimal,
    pub native_threshold: Decimal,
    pub ready_for_deposit: bool,
    pub last_alert_sent: Option<DateTime<Utc>>,
}

impl SkimWalletStatus {
    pub fn from_balances(
        usdc_balance: Decimal,
        native_balance: Decimal,
        usdc_threshold: Decimal,
        native_threshold: Decimal,
        last_alert_sent: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            usdc_balance,
            native_balance,
            usdc_threshold,
            native_threshold,
            ready_for_deposit: usdc_balance >= usdc_threshold
                || native_balance >= native_threshold,
            last_alert_sent,
        }
    }
}
