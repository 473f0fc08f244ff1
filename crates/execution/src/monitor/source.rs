//! Price sources tried in order by the monitor.

use async_trait::async_trait;
use clmm_rebalancer_domain::config::PoolConfig;
use clmm_rebalancer_protocols::client::{AmmClient, OracleClient, PriceSourceError};
use clmm_rebalancer_protocols::rpc::RetryPolicy;
use rust_decimal::Decimal;
use std::sync::Arc;

/// A provider of the current price of token A in token B.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Short name recorded on snapshots.
    fn name(&self) -> &'static str;

    async fn price(&self, pool: &PoolConfig) -> Result<Decimal, PriceSourceError>;
}

/// Reference price from an oracle feed keyed by the pool's pair label.
pub struct OracleSource {
    oracle: Arc<dyn OracleClient>,
    retry: RetryPolicy,
}

impl OracleSource {
    pub fn new(oracle: Arc<dyn OracleClient>, retry: RetryPolicy) -> Self {
        Self { oracle, retry }
    }
}

#[async_trait]
impl PriceSource for OracleSource {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn price(&self, pool: &PoolConfig) -> Result<Decimal, PriceSourceError> {
        let pair = pool.pair_label();
        self.retry
            .run("oracle_price", || self.oracle.price(&pair))
            .await
    }
}

/// Spot price derived from the pool's own sqrt price.
pub struct PoolSpotSource {
    amm: Arc<dyn AmmClient>,
    retry: RetryPolicy,
}

impl PoolSpotSource {
    pub fn new(amm: Arc<dyn AmmClient>, retry: RetryPolicy) -> Self {
        Self { amm, retry }
    }
}

#[async_trait]
impl PriceSource for PoolSpotSource {
    fn name(&self) -> &'static str {
        "pool"
    }

    async fn price(&self, pool: &PoolConfig) -> Result<Decimal, PriceSourceError> {
        let state = self
            .retry
            .run("pool_state", || self.amm.pool_state(&pool.address))
            .await?;
        Ok(state.price)
    }
}
