//! Position manager: the open/close/rebalance state machine.
//!
//! A pool moves through `NoPosition -> Opening -> Active -> Closing` and
//! back. The store records `Active`/`Closed`; `Opening` is the in-flight
//! guard. Every state-changing transaction is simulated before it is
//! submitted, and submissions are never retried.

use super::InFlightPools;
use crate::emergency::PoolRuntimeState;
use crate::error::ExecutionError;
use chrono::Utc;
use clmm_rebalancer_data::store::PositionStore;
use clmm_rebalancer_domain::config::{GlobalConfig, PoolConfig};
use clmm_rebalancer_domain::entities::{FeesCollected, NewPosition, NewRebalance, Position};
use clmm_rebalancer_domain::enums::{CloseReason, TriggerReason};
use clmm_rebalancer_domain::math::concentrated_liquidity::{position_amounts, position_value};
use clmm_rebalancer_domain::math::price_tick::price_to_tick;
use clmm_rebalancer_domain::math::skim::{SkimAmount, compute_skim};
use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
use clmm_rebalancer_protocols::client::{AmmClient, ChainClient};
use clmm_rebalancer_protocols::parsers::{
    parse_fees, parse_gas_used, parse_liquidity, parse_position_id,
};
use clmm_rebalancer_protocols::rpc::RetryPolicy;
use clmm_rebalancer_protocols::tx::{
    ClosePositionParams, CollectFeesParams, OpenPositionParams, SubmitResult, SwapParams,
    Transaction,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Timing knobs for the position manager.
#[derive(Debug, Clone, Copy)]
pub struct PositionManagerConfig {
    /// How long a blocked open waits before re-checking the store.
    pub guard_wait: Duration,
    /// Store lookups for the new position after a close.
    pub danger_window_lookups: u32,
    /// Delay before the second lookup; doubles after each further one.
    pub danger_window_base_delay: Duration,
}

impl Default for PositionManagerConfig {
    fn default() -> Self {
        Self {
            guard_wait: Duration::from_millis(500),
            danger_window_lookups: 3,
            danger_window_base_delay: Duration::from_millis(500),
        }
    }
}

/// A position that was opened and persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenedPosition {
    /// Store row id.
    pub id: i64,
    /// Protocol-assigned position id.
    pub position_id: String,
    pub tx_digest: String,
    /// Native base units, swap included.
    pub gas_used: u64,
}

/// Result of closing a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseOutcome {
    pub fees: FeesCollected,
    /// Native base units, fee collection included.
    pub gas_used: u64,
    pub tx_digest: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebalanceStatus {
    Completed,
    /// Nothing was touched.
    Skipped,
    /// Failed with the old position still in place, or the new one
    /// confirmed but not recorded.
    Failed,
    /// Old position closed, no new position confirmed.
    Critical,
}

/// Outcome of [`PositionManager::rebalance_position`].
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceResult {
    pub status: RebalanceStatus,
    pub rebalance_id: Option<i64>,
    pub new_position: Option<Position>,
    pub fees: FeesCollected,
    pub skim: SkimAmount,
    /// Native units.
    pub gas_used: Decimal,
    pub tx_digest: Option<String>,
    pub error: Option<String>,
}

impl RebalanceResult {
    fn unsuccessful(status: RebalanceStatus, error: String) -> Self {
        Self {
            status,
            rebalance_id: None,
            new_position: None,
            fees: FeesCollected::default(),
            skim: SkimAmount::ZERO,
            gas_used: Decimal::ZERO,
            tx_digest: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == RebalanceStatus::Completed
    }

    pub fn is_critical(&self) -> bool {
        self.status == RebalanceStatus::Critical
    }
}

/// Opens, closes and rebalances positions.
pub struct PositionManager {
    amm: Arc<dyn AmmClient>,
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn PositionStore>,
    retry: RetryPolicy,
    in_flight: InFlightPools,
    global: GlobalConfig,
    config: PositionManagerConfig,
}

impl PositionManager {
    pub fn new(
        amm: Arc<dyn AmmClient>,
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn PositionStore>,
        global: GlobalConfig,
    ) -> Self {
        Self {
            amm,
            chain,
            store,
            retry: RetryPolicy::from_config(&global.retry),
            in_flight: InFlightPools::new(),
            global,
            config: PositionManagerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: PositionManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn in_flight(&self) -> &InFlightPools {
        &self.in_flight
    }

    /// Simulates, then submits once.
    async fn execute(
        &self,
        operation: &'static str,
        tx: &Transaction,
    ) -> Result<SubmitResult, ExecutionError> {
        let simulated = self.retry.run(operation, || self.chain.simulate(tx)).await?;
        if let Some(reason) = simulated.failure() {
            warn!(operation, reason = %reason, "Simulation failed, not executing");
            return Err(ExecutionError::SimulationFailed { operation, reason });
        }

        let result = self.chain.submit(tx).await?;
        if let Some(reason) = result.effects.failure() {
            error!(operation, tx_digest = %result.digest, reason = %reason, "Transaction failed");
            return Err(ExecutionError::TransactionFailed {
                operation,
                reason,
                digest: Some(result.digest),
            });
        }
        debug!(operation, tx_digest = %result.digest, "Transaction executed");
        Ok(result)
    }

    /// Opens a position over `range` and persists it.
    ///
    /// # Errors
    /// Fails without persisting anything when the guard is held, a
    /// position is already active, simulation rejects the open, or the
    /// executed transaction does not reveal a position id.
    pub async fn open_position(
        &self,
        pool: &PoolConfig,
        range: &PriceRange,
        price: Decimal,
        zap: bool,
    ) -> Result<OpenedPosition, ExecutionError> {
        let Some(_guard) = self.in_flight.try_acquire(&pool.address) else {
            tokio::time::sleep(self.config.guard_wait).await;
            if let Some(existing) = self.store.active_position(&pool.address).await? {
                return Err(ExecutionError::PositionAlreadyActive {
                    pool: pool.name.clone(),
                    position_id: existing.position_id,
                });
            }
            return Err(ExecutionError::ConcurrentOperation(pool.name.clone()));
        };

        if let Some(existing) = self.store.active_position(&pool.address).await? {
            return Err(ExecutionError::PositionAlreadyActive {
                pool: pool.name.clone(),
                position_id: existing.position_id,
            });
        }

        let state = self
            .retry
            .run("pool_state", || self.amm.pool_state(&pool.address))
            .await?;
        let tick_lower = price_to_tick(range.lower, state.tick_spacing)?;
        let mut tick_upper = price_to_tick(range.upper, state.tick_spacing)?;
        if tick_upper <= tick_lower {
            tick_upper = tick_lower + state.tick_spacing;
        }

        let amounts = position_amounts(
            pool.position_size_usd,
            price,
            range,
            pool.token_a.decimals,
            pool.token_b.decimals,
        )?;

        let mut gas_used = 0;
        if zap {
            gas_used += self.zap_swap(pool, amounts.amount_a, amounts.amount_b).await;
        }

        let params = OpenPositionParams {
            pool: pool.address.clone(),
            coin_type_a: pool.token_a.address.clone(),
            coin_type_b: pool.token_b.address.clone(),
            tick_lower,
            tick_upper,
            amount_a: amounts.amount_a,
            amount_b: amounts.amount_b,
            slippage_bps: pool.max_slippage_bps,
        };
        let tx = self
            .retry
            .run("build_open_position", || self.amm.build_open_position_tx(&params))
            .await?;
        let result = self.execute("open_position", &tx).await?;
        gas_used += parse_gas_used(&result.effects);

        let Some(position_id) = parse_position_id(&result.effects) else {
            error!(
                pool = %pool.name,
                tx_digest = %result.digest,
                critical = true,
                "Position opened on chain but its id could not be resolved"
            );
            return Err(ExecutionError::PositionIdUnresolved {
                pool: pool.name.clone(),
                digest: result.digest,
            });
        };

        let id = self
            .store
            .create_position(&NewPosition {
                pool_id: pool.address.clone(),
                position_id: position_id.clone(),
                tick_lower,
                tick_upper,
                range: *range,
                liquidity: parse_liquidity(&result.effects).unwrap_or(0),
                amount_a: amounts.amount_a,
                amount_b: amounts.amount_b,
                entry_price: price,
                entry_value_usd: pool.position_size_usd,
            })
            .await?;

        info!(
            pool = %pool.name,
            position_id = %position_id,
            lower = %range.lower,
            upper = %range.upper,
            tx_digest = %result.digest,
            "Position opened"
        );

        Ok(OpenedPosition {
            id,
            position_id,
            tx_digest: result.digest,
            gas_used,
        })
    }

    /// Swaps native coin for the pair's other side when the wallet holds
    /// less of it than the open needs. Failures leave the amounts as
    /// computed. Returns gas spent.
    async fn zap_swap(&self, pool: &PoolConfig, amount_a: u64, amount_b: u64) -> u64 {
        let native = &self.global.native_coin_type;
        let (a_to_b, needed_type, needed) = if pool.token_a.address == *native {
            (true, &pool.token_b.address, amount_b)
        } else if pool.token_b.address == *native {
            (false, &pool.token_a.address, amount_a)
        } else {
            return 0;
        };
        if needed == 0 {
            return 0;
        }

        let owner = self.chain.address();
        let held = match self
            .retry
            .run("balance", || self.chain.balance(owner, needed_type))
            .await
        {
            Ok(held) => held,
            Err(e) => {
                warn!(pool = %pool.name, error = %e, "Balance check failed, skipping zap");
                return 0;
            }
        };
        let Ok(shortfall) = u64::try_from(u128::from(needed).saturating_sub(held)) else {
            return 0;
        };
        if shortfall == 0 {
            return 0;
        }

        let params = SwapParams {
            pool: pool.address.clone(),
            coin_type_a: pool.token_a.address.clone(),
            coin_type_b: pool.token_b.address.clone(),
            a_to_b,
            amount_out: shortfall,
            slippage_bps: pool.max_slippage_bps,
        };
        let swapped = match self
            .retry
            .run("build_swap", || self.amm.build_swap_tx(&params))
            .await
        {
            Ok(tx) => self.execute("swap", &tx).await,
            Err(e) => Err(e.into()),
        };
        match swapped {
            Ok(result) => {
                info!(pool = %pool.name, amount_out = shortfall, a_to_b, tx_digest = %result.digest, "Zap swap executed");
                parse_gas_used(&result.effects)
            }
            Err(e) => {
                warn!(pool = %pool.name, error = %e, "Zap swap failed, opening with computed amounts");
                0
            }
        }
    }

    /// Closes `position` on chain and marks it closed in the store.
    ///
    /// Fee collection is best-effort; a rejected close leaves the
    /// position active. Fees are valued at `mark_price` in quote terms.
    pub async fn close_position(
        &self,
        pool: &PoolConfig,
        position: &Position,
        collect_fees: bool,
        reason: CloseReason,
        mark_price: Decimal,
    ) -> Result<CloseOutcome, ExecutionError> {
        let mut fee_a = 0u64;
        let mut fee_b = 0u64;
        let mut gas_used = 0u64;

        if collect_fees {
            match self.collect_fees(pool, position).await {
                Ok(result) => {
                    let (a, b) = parse_fees(&result.effects);
                    fee_a = a;
                    fee_b = b;
                    gas_used += parse_gas_used(&result.effects);
                }
                Err(e) => {
                    warn!(pool = %pool.name, position_id = %position.position_id, error = %e, "Fee collection failed, closing anyway");
                }
            }
        }

        let params = ClosePositionParams {
            pool: pool.address.clone(),
            position_id: position.position_id.clone(),
            coin_type_a: pool.token_a.address.clone(),
            coin_type_b: pool.token_b.address.clone(),
            collect_fees,
            slippage_bps: pool.max_slippage_bps,
        };
        let tx = self
            .retry
            .run("build_close_position", || self.amm.build_close_position_tx(&params))
            .await?;
        let result = self.execute("close_position", &tx).await?;
        gas_used += parse_gas_used(&result.effects);
        let (close_a, close_b) = parse_fees(&result.effects);
        fee_a = fee_a.saturating_add(close_a);
        fee_b = fee_b.saturating_add(close_b);

        if let Err(e) = self.store.close_position(position.id, reason).await {
            error!(
                pool = %pool.name,
                position_id = %position.position_id,
                tx_digest = %result.digest,
                error = %e,
                critical = true,
                "Position closed on chain but not in the store"
            );
            return Err(e.into());
        }

        let fees = FeesCollected {
            amount_a: fee_a,
            amount_b: fee_b,
            usd: position_value(
                fee_a,
                fee_b,
                mark_price,
                pool.token_a.decimals,
                pool.token_b.decimals,
            ),
        };
        info!(
            pool = %pool.name,
            position_id = %position.position_id,
            reason = %reason,
            fees_usd = %fees.usd,
            tx_digest = %result.digest,
            "Position closed"
        );

        Ok(CloseOutcome {
            fees,
            gas_used,
            tx_digest: result.digest,
        })
    }

    async fn collect_fees(
        &self,
        pool: &PoolConfig,
        position: &Position,
    ) -> Result<SubmitResult, ExecutionError> {
        let params = CollectFeesParams {
            pool: pool.address.clone(),
            position_id: position.position_id.clone(),
            coin_type_a: pool.token_a.address.clone(),
            coin_type_b: pool.token_b.address.clone(),
        };
        let tx = self
            .retry
            .run("build_collect_fees", || self.amm.build_collect_fees_tx(&params))
            .await?;
        self.execute("collect_fees", &tx).await
    }

    /// Closes `position` and reopens over `new_range`.
    ///
    /// Never returns an error: every failure becomes a non-success
    /// [`RebalanceResult`]. `state.last_rebalance_at` is only advanced
    /// once the new position is confirmed in the store.
    pub async fn rebalance_position(
        &self,
        pool: &PoolConfig,
        position: &Position,
        new_range: &PriceRange,
        price: Decimal,
        trigger_reason: TriggerReason,
        state: &mut PoolRuntimeState,
    ) -> RebalanceResult {
        if !state.interval_elapsed(pool.min_rebalance_interval(), Utc::now()) {
            warn!(
                pool = %pool.name,
                last_rebalance_at = ?state.last_rebalance_at,
                "Rebalance skipped, interval not met"
            );
            return RebalanceResult::unsuccessful(
                RebalanceStatus::Skipped,
                "Rebalance interval not met".to_string(),
            );
        }

        info!(
            pool = %pool.name,
            trigger = %trigger_reason,
            price = %price,
            old_lower = %position.range.lower,
            old_upper = %position.range.upper,
            new_lower = %new_range.lower,
            new_upper = %new_range.upper,
            "Executing rebalance"
        );

        let closed = match self
            .close_position(pool, position, true, CloseReason::Rebalance, price)
            .await
        {
            Ok(closed) => closed,
            Err(e) => {
                error!(pool = %pool.name, error = %e, "Rebalance aborted, old position kept");
                return RebalanceResult::unsuccessful(RebalanceStatus::Failed, e.to_string());
            }
        };

        // Profit is (exit - entry) + fees with exit = entry + fees, so the
        // collected fees count twice toward the skim base.
        let skim = compute_skim(
            position.entry_value_usd,
            position.entry_value_usd + closed.fees.usd,
            closed.fees.usd,
            self.global.skim.percentage,
            self.global.skim.split(),
        );

        let opened = self.open_position(pool, new_range, price, true).await;
        let open_gas = opened.as_ref().map_or(0, |o| o.gas_used);
        let open_error = opened.as_ref().err().map(ToString::to_string);

        let Some(new_position) = self.confirm_new_position(&pool.address, position.id).await
        else {
            let reason = open_error.unwrap_or_else(|| "new position not found in store".into());
            let critical = ExecutionError::CriticalDangerWindow {
                pool: pool.name.clone(),
                closed_position: position.position_id.clone(),
                reason,
            };
            error!(
                pool = %pool.name,
                closed_position = %position.position_id,
                close_tx = %closed.tx_digest,
                error = %critical,
                critical = true,
                "Old position closed and no new position confirmed"
            );
            let mut result =
                RebalanceResult::unsuccessful(RebalanceStatus::Critical, critical.to_string());
            result.fees = closed.fees;
            result.tx_digest = Some(closed.tx_digest);
            return result;
        };

        let gas_used = self.native_units(closed.gas_used.saturating_add(open_gas));
        let recorded = self
            .store
            .create_rebalance(&NewRebalance {
                pool_id: pool.address.clone(),
                old_position_id: position.id,
                new_position_id: new_position.id,
                trigger_price: price,
                trigger_reason,
                old_range: position.range,
                new_range: new_position.range,
                fees: closed.fees,
                skim,
                gas_used,
                tx_digest: closed.tx_digest.clone(),
            })
            .await;
        let executed_at = Utc::now();
        state.last_rebalance_at = Some(executed_at);

        match recorded {
            Ok(rebalance_id) => {
                info!(
                    pool = %pool.name,
                    rebalance_id,
                    old_position = position.id,
                    new_position = new_position.id,
                    fees_usd = %closed.fees.usd,
                    skim_usd = %skim.total(),
                    "Rebalance completed"
                );
                RebalanceResult {
                    status: RebalanceStatus::Completed,
                    rebalance_id: Some(rebalance_id),
                    new_position: Some(new_position),
                    fees: closed.fees,
                    skim,
                    gas_used,
                    tx_digest: Some(closed.tx_digest),
                    error: None,
                }
            }
            Err(e) => {
                error!(pool = %pool.name, error = %e, "New position confirmed but rebalance not recorded");
                let mut result = RebalanceResult::unsuccessful(RebalanceStatus::Failed, e.to_string());
                result.new_position = Some(new_position);
                result.fees = closed.fees;
                result.gas_used = gas_used;
                result.tx_digest = Some(closed.tx_digest);
                result
            }
        }
    }

    /// Looks up the pool's active position, tolerating store lag.
    async fn confirm_new_position(&self, pool_id: &str, old_id: i64) -> Option<Position> {
        let lookups = self.config.danger_window_lookups.max(1);
        for attempt in 0..lookups {
            match self.store.active_position(pool_id).await {
                Ok(Some(position)) if position.id != old_id => return Some(position),
                Ok(_) => debug!(pool = pool_id, attempt = attempt + 1, "New position not visible yet"),
                Err(e) => warn!(pool = pool_id, attempt = attempt + 1, error = %e, "Position lookup failed"),
            }
            if attempt + 1 < lookups {
                let delay = self
                    .config
                    .danger_window_base_delay
                    .saturating_mul(2u32.saturating_pow(attempt));
                tokio::time::sleep(delay).await;
            }
        }
        None
    }

    fn native_units(&self, base_units: u64) -> Decimal {
        Decimal::from(base_units)
            / Decimal::from(10u64.pow(u32::from(self.global.native_decimals.min(19))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GAS_PER_TX, MockAmm, MockChain, POOL, USDC, global_config, pool_config};
    use clmm_rebalancer_data::repositories::Database;
    use rust_decimal_macros::dec;

    struct Harness {
        manager: PositionManager,
        amm: Arc<MockAmm>,
        chain: Arc<MockChain>,
        store: Arc<Database>,
    }

    async fn harness() -> Harness {
        let amm = Arc::new(MockAmm::new(dec!(1)));
        let chain = Arc::new(MockChain::default());
        let store = Arc::new(Database::in_memory().await.unwrap());
        let manager = PositionManager::new(amm.clone(), chain.clone(), store.clone(), global_config())
            .with_config(PositionManagerConfig {
                guard_wait: Duration::ZERO,
                danger_window_lookups: 3,
                danger_window_base_delay: Duration::ZERO,
            });
        Harness {
            manager,
            amm,
            chain,
            store,
        }
    }

    fn range() -> PriceRange {
        PriceRange::new(dec!(0.85), dec!(1.10))
    }

    async fn open(h: &Harness) -> Position {
        h.manager
            .open_position(&pool_config(), &range(), dec!(1), false)
            .await
            .unwrap();
        h.store.active_position(POOL).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_open_persists_protocol_id() {
        let h = harness().await;
        let opened = h
            .manager
            .open_position(&pool_config(), &range(), dec!(1), false)
            .await
            .unwrap();

        assert_eq!(opened.position_id, "0xposition1");
        assert_eq!(opened.gas_used, GAS_PER_TX);
        let stored = h.store.active_position(POOL).await.unwrap().unwrap();
        assert_eq!(stored.id, opened.id);
        assert_eq!(stored.range, range());
        assert_eq!(stored.liquidity, 1_000_000);
        assert!(stored.tick_lower < stored.tick_upper);
        assert_eq!(h.chain.simulated_labels(), vec!["open_position"]);
        assert!(!h.manager.in_flight().is_held(POOL));
    }

    #[tokio::test]
    async fn test_simulation_failure_creates_nothing_and_releases_guard() {
        let h = harness().await;
        h.chain.fail_simulation("open_position");

        let err = h
            .manager
            .open_position(&pool_config(), &range(), dec!(1), false)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::SimulationFailed { operation: "open_position", .. }));
        assert!(h.store.active_position(POOL).await.unwrap().is_none());
        assert!(h.chain.submitted().is_empty());
        assert!(!h.manager.in_flight().is_held(POOL));
    }

    #[tokio::test]
    async fn test_unresolved_position_id_is_not_persisted() {
        let h = harness().await;
        h.chain.hide_position_ids();

        let err = h
            .manager
            .open_position(&pool_config(), &range(), dec!(1), false)
            .await
            .unwrap_err();

        assert!(matches!(err, ExecutionError::PositionIdUnresolved { .. }));
        assert!(err.is_critical());
        assert!(h.store.active_positions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_open_is_rejected() {
        let h = harness().await;
        open(&h).await;
        let err = h
            .manager
            .open_position(&pool_config(), &range(), dec!(1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::PositionAlreadyActive { .. }));
        assert_eq!(h.chain.submitted_labels(), vec!["open_position"]);
    }

    #[tokio::test]
    async fn test_held_guard_reports_concurrent_operation() {
        let h = harness().await;
        let _held = h.manager.in_flight().try_acquire(POOL).unwrap();
        let err = h
            .manager
            .open_position(&pool_config(), &range(), dec!(1), false)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::ConcurrentOperation(_)));
        assert!(h.chain.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_zap_swaps_for_missing_side() {
        let h = harness().await;
        h.manager
            .open_position(&pool_config(), &range(), dec!(1), true)
            .await
            .unwrap();

        assert_eq!(h.chain.submitted_labels(), vec!["swap", "open_position"]);
        let swaps = h.amm.swaps.lock().unwrap().clone();
        assert_eq!(swaps.len(), 1);
        assert!(swaps[0].a_to_b);
        let opens = h.amm.opens.lock().unwrap().clone();
        assert_eq!(swaps[0].amount_out, opens[0].amount_b);
    }

    #[tokio::test]
    async fn test_zap_skipped_when_wallet_holds_enough() {
        let h = harness().await;
        h.chain.set_balance(USDC, u128::from(u64::MAX));
        h.manager
            .open_position(&pool_config(), &range(), dec!(1), true)
            .await
            .unwrap();
        assert_eq!(h.chain.submitted_labels(), vec!["open_position"]);
    }

    #[tokio::test]
    async fn test_failed_zap_falls_through_to_open() {
        let h = harness().await;
        h.chain.fail_simulation("swap");
        h.manager
            .open_position(&pool_config(), &range(), dec!(1), true)
            .await
            .unwrap();
        assert_eq!(h.chain.submitted_labels(), vec!["open_position"]);
        assert!(h.store.active_position(POOL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_close_collects_and_values_fees() {
        let h = harness().await;
        let position = open(&h).await;
        h.chain.set_fees(1_000_000_000, 500_000);

        let outcome = h
            .manager
            .close_position(&pool_config(), &position, true, CloseReason::Manual, dec!(2))
            .await
            .unwrap();

        assert_eq!(outcome.fees.amount_a, 1_000_000_000);
        assert_eq!(outcome.fees.amount_b, 500_000);
        assert_eq!(outcome.fees.usd, dec!(2.5));
        assert_eq!(outcome.gas_used, 2 * GAS_PER_TX);
        let closed = h.store.position(position.id).await.unwrap().unwrap();
        assert!(!closed.is_active());
        assert_eq!(closed.close_reason, Some(CloseReason::Manual));
    }

    #[tokio::test]
    async fn test_fee_collection_failure_is_not_fatal() {
        let h = harness().await;
        let position = open(&h).await;
        h.chain.fail_simulation("collect_fees");

        let outcome = h
            .manager
            .close_position(&pool_config(), &position, true, CloseReason::Rebalance, dec!(1))
            .await
            .unwrap();
        assert_eq!(outcome.fees, FeesCollected::default());
        assert!(h.store.active_position(POOL).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_simulation_failure_keeps_position_active() {
        let h = harness().await;
        let position = open(&h).await;
        h.chain.fail_simulation("close_position");

        let err = h
            .manager
            .close_position(&pool_config(), &position, true, CloseReason::Rebalance, dec!(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::SimulationFailed { operation: "close_position", .. }));
        assert!(h.store.active_position(POOL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_rebalance_records_history_and_marker() {
        let h = harness().await;
        let position = open(&h).await;
        h.chain.set_fees(0, 10_000_000);
        h.chain.set_balance(USDC, u128::from(u64::MAX));
        let new_range = PriceRange::new(dec!(1.0), dec!(1.2));
        let mut state = PoolRuntimeState::default();

        let result = h
            .manager
            .rebalance_position(
                &pool_config(),
                &position,
                &new_range,
                dec!(1.085),
                TriggerReason::UpperBreach,
                &mut state,
            )
            .await;

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.fees.usd, dec!(10));
        // 10% of (10 exit gain + 10 fees), split 70/30.
        assert_eq!(result.skim.usdc_equivalent, dec!(1.4));
        assert_eq!(result.skim.native_equivalent, dec!(0.6));
        assert!(state.last_rebalance_at.is_some());

        let new_position = result.new_position.unwrap();
        let active = h.store.active_position(POOL).await.unwrap().unwrap();
        assert_eq!(active.id, new_position.id);
        assert_eq!(active.range, new_range);

        let history = h.store.recent_rebalances(POOL, 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(Some(history[0].id), result.rebalance_id);
        assert_eq!(history[0].old_position_id, position.id);
        assert_eq!(history[0].new_position_id, active.id);
        assert_eq!(history[0].trigger_reason, TriggerReason::UpperBreach);
        assert_eq!(
            h.chain.submitted_labels(),
            vec!["open_position", "collect_fees", "close_position", "open_position"]
        );
    }

    #[tokio::test]
    async fn test_rebalance_within_interval_is_skipped() {
        let h = harness().await;
        let position = open(&h).await;
        let mut state = PoolRuntimeState {
            last_rebalance_at: Some(Utc::now()),
            ..Default::default()
        };

        let result = h
            .manager
            .rebalance_position(
                &pool_config(),
                &position,
                &range(),
                dec!(1),
                TriggerReason::LowerBreach,
                &mut state,
            )
            .await;

        assert_eq!(result.status, RebalanceStatus::Skipped);
        assert_eq!(result.error.as_deref(), Some("Rebalance interval not met"));
        assert_eq!(h.chain.submitted_labels(), vec!["open_position"]);
        assert!(h.store.active_position(POOL).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_failed_close_keeps_old_position_and_records_nothing() {
        let h = harness().await;
        let position = open(&h).await;
        h.chain.fail_submit("close_position");
        let mut state = PoolRuntimeState::default();

        let result = h
            .manager
            .rebalance_position(
                &pool_config(),
                &position,
                &range(),
                dec!(1),
                TriggerReason::LowerBreach,
                &mut state,
            )
            .await;

        assert_eq!(result.status, RebalanceStatus::Failed);
        assert!(!result.is_critical());
        assert!(state.last_rebalance_at.is_none());
        assert_eq!(h.store.active_position(POOL).await.unwrap().unwrap().id, position.id);
        assert!(h.store.recent_rebalances(POOL, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_reopen_is_critical() {
        let h = harness().await;
        let position = open(&h).await;
        h.chain.fail_simulation("open_position");
        let mut state = PoolRuntimeState::default();

        let result = h
            .manager
            .rebalance_position(
                &pool_config(),
                &position,
                &range(),
                dec!(1),
                TriggerReason::UpperBreach,
                &mut state,
            )
            .await;

        assert!(result.is_critical());
        assert!(result.error.unwrap().contains("no new position was confirmed"));
        assert!(state.last_rebalance_at.is_none());
        assert!(h.store.active_position(POOL).await.unwrap().is_none());
        assert!(h.store.recent_rebalances(POOL, 10).await.unwrap().is_empty());
    }
}
