//! Per-pool price fetch with fallback, range context and caching.

use super::PriceSource;
use crate::error::ExecutionError;
use chrono::Utc;
use clmm_rebalancer_data::store::PositionStore;
use clmm_rebalancer_domain::config::PoolConfig;
use clmm_rebalancer_domain::entities::PriceSnapshot;
use clmm_rebalancer_domain::math::range::{RangeDistances, is_in_range, range_distances};
use clmm_rebalancer_protocols::client::PriceSourceError;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Fetches, caches and records pool prices.
pub struct PriceMonitor {
    /// Sources in priority order.
    sources: Vec<Arc<dyn PriceSource>>,
    store: Arc<dyn PositionStore>,
    /// Latest snapshot per pool id.
    cache: Arc<RwLock<HashMap<String, PriceSnapshot>>>,
}

impl PriceMonitor {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>, store: Arc<dyn PositionStore>) -> Self {
        Self {
            sources,
            store,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Fetches the pool's price and builds a snapshot against its active position.
    ///
    /// # Errors
    /// [`ExecutionError::InvalidConfig`] for an unusable pool address,
    /// [`ExecutionError::PriceUnavailable`] when no source produced a price.
    pub async fn fetch_price(&self, pool: &PoolConfig) -> Result<PriceSnapshot, ExecutionError> {
        if !pool.has_valid_address() {
            return Err(ExecutionError::InvalidConfig(format!(
                "pool {} has invalid address '{}'",
                pool.name, pool.address
            )));
        }

        let (price, source) = self.resolve_price(pool).await?;

        let position = self.store.active_position(&pool.address).await?;
        let (in_range, distances) = match &position {
            Some(p) => (
                is_in_range(price, &p.range),
                range_distances(price, &p.range).unwrap_or(RangeDistances::ZERO),
            ),
            None => (false, RangeDistances::ZERO),
        };

        let snapshot = PriceSnapshot {
            pool_id: pool.address.clone(),
            price,
            in_range,
            distance_to_lower: distances.to_lower_pct,
            distance_to_upper: distances.to_upper_pct,
            source: source.to_string(),
            timestamp: Utc::now(),
        };

        self.cache
            .write()
            .await
            .insert(pool.address.clone(), snapshot.clone());

        if let Err(e) = self.store.record_price_snapshot(&snapshot).await {
            warn!(pool = %pool.name, error = %e, "Failed to record price history");
        }

        debug!(
            pool = %pool.name,
            price = %price,
            source,
            in_range,
            "Price fetched"
        );
        Ok(snapshot)
    }

    async fn resolve_price(&self, pool: &PoolConfig) -> Result<(Decimal, &'static str), ExecutionError> {
        let mut last_error = "no price sources configured".to_string();
        for source in &self.sources {
            match source.price(pool).await {
                Ok(price) if price > Decimal::ZERO => return Ok((price, source.name())),
                Ok(price) => {
                    warn!(pool = %pool.name, source = source.name(), %price, "Ignoring non-positive price");
                    last_error = format!("{} returned {}", source.name(), price);
                }
                Err(PriceSourceError::Fatal(reason)) => {
                    return Err(ExecutionError::PriceUnavailable {
                        pool: pool.name.clone(),
                        reason,
                    });
                }
                Err(e @ PriceSourceError::Unavailable(_)) => {
                    debug!(pool = %pool.name, source = source.name(), error = %e, "Source unavailable, falling back");
                    last_error = e.to_string();
                }
                Err(e) => {
                    warn!(pool = %pool.name, source = source.name(), error = %e, "Source failed, falling back");
                    last_error = e.to_string();
                }
            }
        }
        Err(ExecutionError::PriceUnavailable {
            pool: pool.name.clone(),
            reason: last_error,
        })
    }

    /// Fetches every enabled pool. Failed pools are logged and left out.
    pub async fn fetch_prices_for_pools(
        &self,
        pools: &[PoolConfig],
    ) -> HashMap<String, PriceSnapshot> {
        let mut snapshots = HashMap::new();
        for pool in pools.iter().filter(|p| p.enabled) {
            match self.fetch_price(pool).await {
                Ok(snapshot) => {
                    snapshots.insert(pool.address.clone(), snapshot);
                }
                Err(e) => warn!(pool = %pool.name, error = %e, "Price fetch failed"),
            }
        }
        snapshots
    }

    /// Last successfully fetched snapshot for the pool.
    pub async fn cached_price(&self, pool_id: &str) -> Option<PriceSnapshot> {
        self.cache.read().await.get(pool_id).cloned()
    }
}
