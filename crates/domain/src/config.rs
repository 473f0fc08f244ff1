//! Configuration types consumed by the engine.
//!
//! Loading (env, files) lives in the binary; these types only carry
//! values and validate them.

use crate::enums::RangeMode;
use crate::math::skim::{DEFAULT_USDC_SHARE, SkimSplit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("pool {pool}: invalid address {address:?}")]
    InvalidAddress { pool: String, address: String },

    #[error("pool {pool}: {reason}")]
    InvalidPool { pool: String, reason: String },

    #[error("invalid global setting {key}: {reason}")]
    InvalidGlobal { key: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub address: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Static per-pool strategy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    pub address: String,
    pub name: String,
    pub token_a: TokenInfo,
    pub token_b: TokenInfo,
    /// Fee tier in hundredths of a basis point (2500 = 0.25%).
    pub fee_tier: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub position_size_usd: Decimal,
    #[serde(default)]
    pub range_mode: RangeMode,
    pub range_lower_bps: u32,
    pub range_upper_bps: u32,
    /// Percent of range consumed before rebalancing (80 = 80%).
    pub rebalance_threshold_pct: Decimal,

    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: u16,
    #[serde(default = "default_min_rebalance_interval_ms")]
    pub min_rebalance_interval_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_max_slippage_bps() -> u16 {
    50
}

fn default_min_rebalance_interval_ms() -> u64 {
    60_000
}

impl PoolConfig {
    /// An address is usable when it is non-empty and not a bare `0x` prefix.
    pub fn has_valid_address(&self) -> bool {
        let address = self.address.trim();
        !address.is_empty() && address != "0x"
    }

    /// Enabled pools with an invalid address are treated as disabled.
    pub fn is_operational(&self) -> bool {
        self.enabled && self.has_valid_address()
    }

    /// Threshold as a fraction (0.80 for 80%).
    pub fn threshold_fraction(&self) -> Decimal {
        self.rebalance_threshold_pct / Decimal::ONE_HUNDRED
    }

    pub fn min_rebalance_interval(&self) -> Duration {
        Duration::from_millis(self.min_rebalance_interval_ms)
    }

    /// Label used to look up oracle feeds, e.g. `SUI/USDC`.
    pub fn pair_label(&self) -> String {
        format!("{}/{}", self.token_a.symbol, self.token_b.symbol)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidPool {
            pool: self.name.clone(),
            reason,
        };
        if !self.has_valid_address() {
            return Err(ConfigError::InvalidAddress {
                pool: self.name.clone(),
                address: self.address.clone(),
            });
        }
        if self.range_lower_bps == 0 || self.range_upper_bps == 0 {
            return Err(invalid("range offsets must be greater than zero".into()));
        }
        if self.range_lower_bps >= 10_000 {
            return Err(invalid(format!(
                "range_lower_bps {} would put the lower bound at or below zero",
                self.range_lower_bps
            )));
        }
        if self.rebalance_threshold_pct <= Decimal::ZERO
            || self.rebalance_threshold_pct > Decimal::ONE_HUNDRED
        {
            return Err(invalid(format!(
                "rebalance_threshold_pct {} outside (0, 100]",
                self.rebalance_threshold_pct
            )));
        }
        if self.position_size_usd <= Decimal::ZERO {
            return Err(invalid("position_size_usd must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkimThresholds {
    pub usdc: Decimal,
    pub native: Decimal,
}

impl Default for SkimThresholds {
    fn default() -> Self {
        Self {
            usdc: Decimal::from(50),
            native: Decimal::from(20),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkimConfig {
    /// Fraction of profit skimmed (0.10 for 10%).
    pub percentage: Decimal,
    pub usdc_share: Decimal,
    pub wallet_address: String,
    pub thresholds: SkimThresholds,
    pub alert_cooldown_hours: i64,
}

impl SkimConfig {
    pub fn split(&self) -> SkimSplit {
        SkimSplit::new(self.usdc_share)
    }
}

impl Default for SkimConfig {
    fn default() -> Self {
        Self {
            percentage: Decimal::new(10, 2),
            usdc_share: DEFAULT_USDC_SHARE,
            wallet_address: String::new(),
            thresholds: SkimThresholds::default(),
            alert_cooldown_hours: 24,
        }
    }
}

/// Retry-with-backoff settings for every external call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            multiplier: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub poll_interval_ms: u64,
    pub skim: SkimConfig,
    /// Native balance below which initial positions are not opened.
    pub min_native_balance: Decimal,
    pub native_coin_type: String,
    pub native_decimals: u8,
    pub usdc_coin_type: String,
    pub usdc_decimals: u8,
    pub max_consecutive_failures: u32,
    pub alert_on_every_rebalance: bool,
    pub retry: RetryConfig,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10_000,
            skim: SkimConfig::default(),
            min_native_balance: Decimal::new(5, 1),
            native_coin_type: "0x2::sui::SUI".to_string(),
            native_decimals: 9,
            usdc_coin_type:
                "0xdba34672e30cb065b1f93e3ab55318768fd6fef66c15942c9f7cb846e2f900e7::usdc::USDC"
                    .to_string(),
            usdc_decimals: 6,
            max_consecutive_failures: 3,
            alert_on_every_rebalance: true,
            retry: RetryConfig::default(),
        }
    }
}

impl GlobalConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = Decimal::ZERO..=Decimal::ONE;
        if !unit.contains(&self.skim.percentage) {
            return Err(ConfigError::InvalidGlobal {
                key: "SKIM_PERCENTAGE",
                reason: format!("{} outside [0, 1]", self.skim.percentage),
            });
        }
        if !unit.contains(&self.skim.usdc_share) {
            return Err(ConfigError::InvalidGlobal {
                key: "SKIM_USDC_SHARE",
                reason: format!("{} outside [0, 1]", self.skim.usdc_share),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidGlobal {
                key: "POLL_INTERVAL_MS",
                reason: "must be greater than zero".into(),
            });
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidGlobal {
                key: "MAX_CONSECUTIVE_FAILURES",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}
