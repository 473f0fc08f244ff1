//! Process configuration loaded from the environment and the pools file.

use anyhow::{Context, Result, bail};
use clmm_rebalancer_domain::prelude::*;
use clmm_rebalancer_protocols::bridge::DEFAULT_BRIDGE_URL;
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/optimizer.db";
pub const DEFAULT_POOLS_CONFIG: &str = "config/pools.json";

/// Everything the binary needs to wire the engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub global: GlobalConfig,
    pub pools: Vec<PoolConfig>,
    pub wallet_address: String,
    pub bridge_url: String,
    pub database_url: String,
    pub telegram: Option<TelegramSettings>,
    pub hermes_url: Option<String>,
    /// `(pair label, feed id)` for every pool with a `PYTH_FEED_*` entry.
    pub pyth_feeds: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub chat_id: String,
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::load(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, reading pools from the
    /// file named by `POOLS_CONFIG`.
    pub fn load(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let global = global_from(&lookup)?;
        let pools_path =
            lookup("POOLS_CONFIG").unwrap_or_else(|| DEFAULT_POOLS_CONFIG.to_string());
        let pools = load_pools(Path::new(&pools_path))?;
        let pyth_feeds = pools
            .iter()
            .filter_map(|pool| {
                lookup(&feed_key(pool)).map(|feed_id| (pool.pair_label(), feed_id))
            })
            .collect();

        let telegram = match (
            non_empty(lookup("TELEGRAM_BOT_TOKEN")),
            non_empty(lookup("TELEGRAM_CHAT_ID")),
        ) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramSettings { bot_token, chat_id }),
            _ => None,
        };

        Ok(Self {
            global,
            pools,
            wallet_address: non_empty(lookup("WALLET_ADDRESS")).unwrap_or_default(),
            bridge_url: lookup("BRIDGE_URL").unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string()),
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            telegram,
            hermes_url: non_empty(lookup("PYTH_HERMES_URL")),
            pyth_feeds,
        })
    }
}

/// Environment key holding the Hermes feed id for a pool, e.g.
/// `PYTH_FEED_SUI_USDC`.
pub fn feed_key(pool: &PoolConfig) -> String {
    format!(
        "PYTH_FEED_{}_{}",
        pool.token_a.symbol.to_uppercase(),
        pool.token_b.symbol.to_uppercase()
    )
}

/// Builds and validates the global settings.
pub fn global_from(lookup: &impl Fn(&str) -> Option<String>) -> Result<GlobalConfig> {
    let defaults = GlobalConfig::default();
    let skim_percent: Decimal = parse_or(lookup, "SKIM_PERCENTAGE", Decimal::from(10))?;

    let global = GlobalConfig {
        poll_interval_ms: parse_or(lookup, "POLL_INTERVAL_MS", defaults.poll_interval_ms)?,
        skim: SkimConfig {
            percentage: skim_percent / Decimal::ONE_HUNDRED,
            usdc_share: parse_or(lookup, "SKIM_USDC_SHARE", defaults.skim.usdc_share)?,
            wallet_address: non_empty(lookup("SKIM_WALLET_ADDRESS")).unwrap_or_default(),
            thresholds: SkimThresholds {
                usdc: parse_or(
                    lookup,
                    "SKIM_WALLET_USDC_THRESHOLD",
                    defaults.skim.thresholds.usdc,
                )?,
                native: parse_or(
                    lookup,
                    "SKIM_WALLET_NATIVE_THRESHOLD",
                    defaults.skim.thresholds.native,
                )?,
            },
            alert_cooldown_hours: parse_or(
                lookup,
                "DEPOSIT_ALERT_COOLDOWN_HOURS",
                defaults.skim.alert_cooldown_hours,
            )?,
        },
        min_native_balance: parse_or(lookup, "MIN_NATIVE_BALANCE", defaults.min_native_balance)?,
        native_coin_type: lookup("NATIVE_COIN_TYPE").unwrap_or(defaults.native_coin_type),
        native_decimals: parse_or(lookup, "NATIVE_DECIMALS", defaults.native_decimals)?,
        usdc_coin_type: lookup("USDC_COIN_TYPE").unwrap_or(defaults.usdc_coin_type),
        usdc_decimals: parse_or(lookup, "USDC_DECIMALS", defaults.usdc_decimals)?,
        max_consecutive_failures: parse_or(
            lookup,
            "MAX_CONSECUTIVE_FAILURES",
            defaults.max_consecutive_failures,
        )?,
        alert_on_every_rebalance: parse_or(
            lookup,
            "ALERT_ON_EVERY_REBALANCE",
            defaults.alert_on_every_rebalance,
        )?,
        retry: RetryConfig {
            max_retries: parse_or(lookup, "RPC_MAX_RETRIES", defaults.retry.max_retries)?,
            base_delay_ms: parse_or(lookup, "RPC_RETRY_DELAY_MS", defaults.retry.base_delay_ms)?,
            multiplier: defaults.retry.multiplier,
        },
    };
    global.validate()?;
    Ok(global)
}

/// Reads the pools file and keeps the operational pools.
pub fn load_pools(path: &Path) -> Result<Vec<PoolConfig>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading pools file {}", path.display()))?;
    parse_pools(&raw).with_context(|| format!("parsing pools file {}", path.display()))
}

/// Parses a JSON array of pools.
///
/// Disabled pools and pools with a placeholder address are skipped with a
/// warning; any other invalid value is an error.
pub fn parse_pools(raw: &str) -> Result<Vec<PoolConfig>> {
    let all: Vec<PoolConfig> = serde_json::from_str(raw)?;
    let mut pools = Vec::with_capacity(all.len());
    for pool in all {
        if !pool.enabled {
            info!(pool = %pool.name, "Pool disabled, skipping");
            continue;
        }
        if !pool.has_valid_address() {
            warn!(pool = %pool.name, address = %pool.address, "Pool has no usable address, skipping");
            continue;
        }
        pool.validate()?;
        pools.push(pool);
    }
    if pools.is_empty() {
        bail!("no operational pools configured");
    }
    Ok(pools)
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match non_empty(lookup(key)) {
        Some(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw:?}: {e}")),
        None => Ok(default),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
