//! The polling control loop and the operator operations built on it.

use crate::alerts::{Notification, Notifier, RebalanceSummary, notify_quietly};
use crate::emergency::{PoolRuntimeState, PoolStates};
use crate::error::ExecutionError;
use crate::monitor::{OracleSource, PoolSpotSource, PriceMonitor, PriceSource};
use crate::position::{
    CloseOutcome, InFlightGuard, InFlightPools, OpenedPosition, PositionManager,
    PositionManagerConfig, RebalanceResult, RebalanceStatus,
};
use crate::skim::SkimManager;
use crate::strategy::{Decision, StrategyEngine};
use clmm_rebalancer_data::store::PositionStore;
use clmm_rebalancer_domain::config::{GlobalConfig, PoolConfig};
use clmm_rebalancer_domain::entities::{Position, PriceSnapshot, Rebalance};
use clmm_rebalancer_domain::enums::{CloseReason, TriggerReason};
use clmm_rebalancer_domain::math::range::compute_range;
use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
use clmm_rebalancer_protocols::client::{AmmClient, ChainClient, OracleClient};
use clmm_rebalancer_protocols::rpc::RetryPolicy;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

/// External boundaries the orchestrator is wired to.
pub struct Boundaries {
    pub amm: Arc<dyn AmmClient>,
    pub chain: Arc<dyn ChainClient>,
    /// Tried before the pool's own spot price when present.
    pub oracle: Option<Arc<dyn OracleClient>>,
    pub store: Arc<dyn PositionStore>,
    pub notifier: Arc<dyn Notifier>,
}

/// What happened to one pool in a cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolOutcome {
    Held,
    Opened(OpenedPosition),
    Rebalanced(Box<RebalanceResult>),
    /// Deliberately not acted on.
    Skipped(String),
    /// Capital left unmanaged; the pool has been paused.
    Critical(Box<RebalanceResult>),
}

/// Summary of one pass over the pools.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub pools_checked: usize,
    pub opened: usize,
    pub rebalanced: usize,
    pub failures: usize,
    /// Pools paused during this cycle.
    pub paused: Vec<String>,
    pub deposit_alert_sent: bool,
}

/// Operator view of one pool.
#[derive(Debug, Clone)]
pub struct PoolMetrics {
    pub pool: PoolConfig,
    pub snapshot: Option<PriceSnapshot>,
    pub position: Option<Position>,
    /// Decision at the cached price, if there is one.
    pub decision: Option<Decision>,
    pub state: PoolRuntimeState,
    pub recent_rebalances: Vec<Rebalance>,
}

/// Drives price monitoring, decisions, rebalances and skims for every pool.
pub struct Orchestrator {
    pools: Vec<PoolConfig>,
    global: GlobalConfig,
    monitor: PriceMonitor,
    strategy: StrategyEngine,
    positions: PositionManager,
    skim: SkimManager,
    store: Arc<dyn PositionStore>,
    chain: Arc<dyn ChainClient>,
    notifier: Arc<dyn Notifier>,
    states: PoolStates,
    /// Pools with a cycle step or operator action touching positions.
    operations: InFlightPools,
    retry: RetryPolicy,
    running: AtomicBool,
    shutdown: Notify,
}

impl Orchestrator {
    pub fn new(pools: Vec<PoolConfig>, global: GlobalConfig, boundaries: Boundaries) -> Self {
        let retry = RetryPolicy::from_config(&global.retry);

        let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();
        if let Some(oracle) = boundaries.oracle {
            sources.push(Arc::new(OracleSource::new(oracle, retry)));
        }
        sources.push(Arc::new(PoolSpotSource::new(boundaries.amm.clone(), retry)));

        Self {
            monitor: PriceMonitor::new(sources, boundaries.store.clone()),
            strategy: StrategyEngine,
            positions: PositionManager::new(
                boundaries.amm,
                boundaries.chain.clone(),
                boundaries.store.clone(),
                global.clone(),
            ),
            skim: SkimManager::new(
                boundaries.chain.clone(),
                boundaries.store.clone(),
                boundaries.notifier.clone(),
                &global,
            ),
            store: boundaries.store,
            chain: boundaries.chain,
            notifier: boundaries.notifier,
            states: PoolStates::new(),
            operations: InFlightPools::new(),
            retry,
            running: AtomicBool::new(false),
            shutdown: Notify::new(),
            pools,
            global,
        }
    }

    #[must_use]
    pub fn with_position_config(mut self, config: PositionManagerConfig) -> Self {
        self.positions = self.positions.with_config(config);
        self
    }

    pub fn pools(&self) -> &[PoolConfig] {
        &self.pools
    }

    pub fn monitor(&self) -> &PriceMonitor {
        &self.monitor
    }

    pub fn skim(&self) -> &SkimManager {
        &self.skim
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Runs cycles every poll interval until [`Orchestrator::stop`].
    /// Ticks missed while a cycle runs are skipped, not queued.
    pub async fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.seed_from_store().await;
        if let Some(balance) = self.native_balance().await
            && balance < self.global.min_native_balance
        {
            warn!(
                balance = %balance,
                minimum = %self.global.min_native_balance,
                "Native balance below safety floor, initial positions will not be opened"
            );
        }

        let mut ticker = interval(self.global.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            pools = self.pools.len(),
            interval_ms = self.global.poll_interval_ms,
            "Starting orchestrator"
        );

        while self.is_running() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.shutdown.notified() => break,
            }
            if !self.is_running() {
                break;
            }
            let report = self.run_cycle().await;
            debug!(
                checked = report.pools_checked,
                opened = report.opened,
                rebalanced = report.rebalanced,
                failures = report.failures,
                "Cycle complete"
            );
        }

        info!("Orchestrator stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Loads each pool's last rebalance time so a restart keeps the
    /// minimum interval.
    pub async fn seed_from_store(&self) {
        for pool in &self.pools {
            match self.store.last_rebalance_at(&pool.address).await {
                Ok(Some(at)) => self.states.record_rebalance(&pool.address, at).await,
                Ok(None) => {}
                Err(e) => warn!(pool = %pool.name, error = %e, "Failed to load last rebalance time"),
            }
        }
    }

    /// One pass over every operational, unpaused pool, then the deposit
    /// check. Pools without a usable address are never polled.
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        let mut pools = Vec::new();
        for pool in self.pools.iter().filter(|p| p.is_operational()) {
            if !self.states.is_paused(&pool.address).await {
                pools.push(pool.clone());
            }
        }
        let snapshots = self.monitor.fetch_prices_for_pools(&pools).await;

        for pool in &pools {
            report.pools_checked += 1;
            let outcome = match snapshots.get(&pool.address) {
                Some(snapshot) => self.process_pool(pool, snapshot).await,
                None => Err(ExecutionError::PriceUnavailable {
                    pool: pool.name.clone(),
                    reason: "no price this cycle".into(),
                }),
            };

            match outcome {
                Ok(PoolOutcome::Critical(_)) => {
                    report.failures += 1;
                    report.paused.push(pool.name.clone());
                }
                Ok(PoolOutcome::Skipped(reason)) => {
                    debug!(pool = %pool.name, reason = %reason, "Pool skipped");
                }
                Ok(outcome) => {
                    match outcome {
                        PoolOutcome::Opened(_) => report.opened += 1,
                        PoolOutcome::Rebalanced(_) => report.rebalanced += 1,
                        _ => {}
                    }
                    self.states.record_success(&pool.address).await;
                }
                Err(e) => {
                    report.failures += 1;
                    if self.handle_failure(pool, &e).await {
                        report.paused.push(pool.name.clone());
                    }
                }
            }
        }

        match self.skim.check_deposit_threshold().await {
            Ok(sent) => report.deposit_alert_sent = sent,
            Err(e) => warn!(error = %e, "Deposit threshold check failed"),
        }
        report
    }

    async fn process_pool(
        &self,
        pool: &PoolConfig,
        snapshot: &PriceSnapshot,
    ) -> Result<PoolOutcome, ExecutionError> {
        let Ok(_guard) = self.claim(pool) else {
            return Ok(PoolOutcome::Skipped("operation in progress".into()));
        };
        let Some(position) = self.store.active_position(&pool.address).await? else {
            return self.open_initial(pool, snapshot.price).await;
        };

        let decision = self.strategy.decide(snapshot, Some(&position), pool)?;
        let Decision::Rebalance {
            trigger_reason,
            new_range,
        } = decision
        else {
            debug!(pool = %pool.name, price = %snapshot.price, "Holding");
            return Ok(PoolOutcome::Held);
        };

        let result = self
            .execute_rebalance(pool, &position, &new_range, snapshot.price, trigger_reason)
            .await;
        match result.status {
            RebalanceStatus::Completed => Ok(PoolOutcome::Rebalanced(Box::new(result))),
            RebalanceStatus::Skipped => Ok(PoolOutcome::Skipped(
                result.error.unwrap_or_else(|| "rebalance skipped".into()),
            )),
            RebalanceStatus::Critical => Ok(PoolOutcome::Critical(Box::new(result))),
            RebalanceStatus::Failed => Err(ExecutionError::RebalanceFailed(
                result.error.unwrap_or_else(|| "unknown error".into()),
            )),
        }
    }

    async fn open_initial(
        &self,
        pool: &PoolConfig,
        price: Decimal,
    ) -> Result<PoolOutcome, ExecutionError> {
        let balance = self.native_balance().await.unwrap_or(Decimal::ZERO);
        if balance < self.global.min_native_balance {
            warn!(
                pool = %pool.name,
                balance = %balance,
                minimum = %self.global.min_native_balance,
                "Native balance below safety floor, not opening"
            );
            return Ok(PoolOutcome::Skipped("native balance below safety floor".into()));
        }

        let range = compute_range(price, pool.range_lower_bps, pool.range_upper_bps)?;
        match self.positions.open_position(pool, &range, price, true).await {
            Ok(opened) => {
                notify_quietly(
                    self.notifier.as_ref(),
                    &Notification::PositionOpened {
                        pool_name: pool.name.clone(),
                        position_id: opened.position_id.clone(),
                        range,
                        tx_digest: opened.tx_digest.clone(),
                    },
                )
                .await;
                Ok(PoolOutcome::Opened(opened))
            }
            Err(ExecutionError::PositionAlreadyActive { .. }) => Ok(PoolOutcome::Held),
            Err(e) => Err(e),
        }
    }

    /// Runs the rebalance and its follow-ups: marker update, skim
    /// transfer, notification, or pause on a critical outcome.
    async fn execute_rebalance(
        &self,
        pool: &PoolConfig,
        position: &Position,
        new_range: &PriceRange,
        price: Decimal,
        trigger_reason: TriggerReason,
    ) -> RebalanceResult {
        let mut state = self.states.get(&pool.address).await;
        let result = self
            .positions
            .rebalance_position(pool, position, new_range, price, trigger_reason, &mut state)
            .await;
        if let Some(at) = state.last_rebalance_at {
            self.states.record_rebalance(&pool.address, at).await;
        }

        match result.status {
            RebalanceStatus::Completed => {
                let (usdc, native) = self.skim_amounts(pool, price, &result);
                self.skim
                    .transfer_skim(usdc, native, &pool.address, result.rebalance_id)
                    .await;

                if self.global.alert_on_every_rebalance {
                    let summary = RebalanceSummary {
                        pool_name: pool.name.clone(),
                        trigger_reason,
                        trigger_price: price,
                        old_range: position.range,
                        new_range: result
                            .new_position
                            .as_ref()
                            .map_or(*new_range, |p| p.range),
                        fees_usd: result.fees.usd,
                        skim: result.skim,
                        gas_used: result.gas_used,
                        tx_digest: result.tx_digest.clone().unwrap_or_default(),
                    };
                    notify_quietly(
                        self.notifier.as_ref(),
                        &Notification::RebalanceExecuted(summary),
                    )
                    .await;
                }
            }
            RebalanceStatus::Critical => {
                let message = result
                    .error
                    .clone()
                    .unwrap_or_else(|| "new position not confirmed".into());
                self.escalate_and_pause(pool, "danger_window", &message).await;
            }
            RebalanceStatus::Skipped | RebalanceStatus::Failed => {}
        }
        result
    }

    /// Splits the skim into USDC and native coin amounts. Without a
    /// native price the whole skim goes out as USDC.
    fn skim_amounts(
        &self,
        pool: &PoolConfig,
        price: Decimal,
        result: &RebalanceResult,
    ) -> (Decimal, Decimal) {
        let skim = result.skim;
        match self.native_usd_price(pool, price) {
            Some(native_price) if native_price > Decimal::ZERO => {
                (skim.usdc_equivalent, skim.native_equivalent / native_price)
            }
            _ => {
                if !skim.native_equivalent.is_zero() {
                    warn!(pool = %pool.name, "No native price, skimming native share as USDC");
                }
                (skim.total(), Decimal::ZERO)
            }
        }
    }

    fn native_usd_price(&self, pool: &PoolConfig, price: Decimal) -> Option<Decimal> {
        let native = &self.global.native_coin_type;
        let usdc = &self.global.usdc_coin_type;
        if pool.token_a.address == *native && pool.token_b.address == *usdc {
            return Some(price);
        }
        if pool.token_b.address == *native && pool.token_a.address == *usdc && !price.is_zero() {
            return Some(Decimal::ONE / price);
        }
        None
    }

    /// Counts a failure, pausing and escalating at the limit. Critical
    /// errors pause immediately. Returns whether the pool was paused.
    async fn handle_failure(&self, pool: &PoolConfig, e: &ExecutionError) -> bool {
        if e.is_critical() {
            error!(pool = %pool.name, error = %e, critical = true, "Critical pool failure");
            return self.escalate_and_pause(pool, "critical_error", &e.to_string()).await;
        }

        warn!(pool = %pool.name, error = %e, "Pool cycle failed");
        let paused = self
            .states
            .record_failure(&pool.address, self.global.max_consecutive_failures)
            .await;
        if paused {
            let message = format!(
                "Paused after {} consecutive failures. Last error: {}",
                self.global.max_consecutive_failures, e
            );
            notify_quietly(
                self.notifier.as_ref(),
                &Notification::Escalation {
                    kind: "auto_pause".into(),
                    pool: Some(pool.name.clone()),
                    message,
                },
            )
            .await;
        }
        paused
    }

    async fn escalate_and_pause(&self, pool: &PoolConfig, kind: &str, message: &str) -> bool {
        let paused = self.states.pause(&pool.address, message).await;
        notify_quietly(
            self.notifier.as_ref(),
            &Notification::Escalation {
                kind: kind.to_string(),
                pool: Some(pool.name.clone()),
                message: message.to_string(),
            },
        )
        .await;
        paused
    }

    /// Native balance in whole coins, `None` when it cannot be read.
    async fn native_balance(&self) -> Option<Decimal> {
        let owner = self.chain.address();
        let coin_type = &self.global.native_coin_type;
        match self
            .retry
            .run("balance", || self.chain.balance(owner, coin_type))
            .await
        {
            Ok(raw) => {
                let raw = u64::try_from(raw).unwrap_or(u64::MAX);
                let scale = 10u64.pow(u32::from(self.global.native_decimals.min(19)));
                Some(Decimal::from(raw) / Decimal::from(scale))
            }
            Err(e) => {
                warn!(error = %e, "Failed to read native balance");
                None
            }
        }
    }

    /// Claims the pool for one open, rebalance or close. Held from reading
    /// the active position until the rebalance marker is written.
    fn claim(&self, pool: &PoolConfig) -> Result<InFlightGuard, ExecutionError> {
        self.operations
            .try_acquire(&pool.address)
            .ok_or_else(|| ExecutionError::ConcurrentOperation(pool.name.clone()))
    }

    /// Finds a pool by address or case-insensitive name.
    pub fn find_pool(&self, key: &str) -> Result<&PoolConfig, ExecutionError> {
        self.pools
            .iter()
            .find(|p| p.address == key || p.name.eq_ignore_ascii_case(key))
            .ok_or_else(|| ExecutionError::InvalidConfig(format!("unknown pool '{}'", key)))
    }

    /// Suspends automated actions on the pool. Returns false if it
    /// was already paused.
    pub async fn pause_pool(&self, key: &str) -> Result<bool, ExecutionError> {
        let pool = self.find_pool(key)?;
        Ok(self.states.pause(&pool.address, "operator").await)
    }

    /// Resumes the pool and clears its failure count.
    pub async fn resume_pool(&self, key: &str) -> Result<bool, ExecutionError> {
        let pool = self.find_pool(key)?;
        Ok(self.states.resume(&pool.address).await)
    }

    /// Rebalances around the current price regardless of the threshold.
    /// The minimum interval still applies.
    pub async fn manual_rebalance(&self, key: &str) -> Result<RebalanceResult, ExecutionError> {
        let pool = self.find_pool(key)?;
        let _guard = self.claim(pool)?;
        let snapshot = self.monitor.fetch_price(pool).await?;
        let position = self.store.active_position(&pool.address).await?.ok_or_else(|| {
            ExecutionError::InvalidConfig(format!("pool {} has no active position", pool.name))
        })?;
        let new_range = compute_range(snapshot.price, pool.range_lower_bps, pool.range_upper_bps)?;

        info!(pool = %pool.name, price = %snapshot.price, "Manual rebalance requested");
        Ok(self
            .execute_rebalance(pool, &position, &new_range, snapshot.price, TriggerReason::Manual)
            .await)
    }

    /// Pauses the pool and closes its position, collecting fees.
    pub async fn emergency_close(&self, key: &str) -> Result<CloseOutcome, ExecutionError> {
        let pool = self.find_pool(key)?;
        let _guard = self.claim(pool)?;
        let position = self.store.active_position(&pool.address).await?.ok_or_else(|| {
            ExecutionError::InvalidConfig(format!("pool {} has no active position", pool.name))
        })?;
        self.states.pause(&pool.address, "emergency close").await;

        let price = match self.monitor.fetch_price(pool).await {
            Ok(snapshot) => snapshot.price,
            Err(e) => {
                warn!(pool = %pool.name, error = %e, "No fresh price, valuing fees at entry price");
                position.entry_price
            }
        };

        let outcome = self
            .positions
            .close_position(pool, &position, true, CloseReason::Emergency, price)
            .await?;
        notify_quietly(
            self.notifier.as_ref(),
            &Notification::Text(format!(
                "Emergency close of {}: position {} closed, fees ${:.2}, tx {}",
                pool.name, position.position_id, outcome.fees.usd, outcome.tx_digest
            )),
        )
        .await;
        Ok(outcome)
    }

    /// Cached price, active position, decision and runtime state.
    pub async fn pool_metrics(&self, key: &str) -> Result<PoolMetrics, ExecutionError> {
        let pool = self.find_pool(key)?;
        let snapshot = self.monitor.cached_price(&pool.address).await;
        let position = self.store.active_position(&pool.address).await?;
        let decision = match &snapshot {
            Some(s) => Some(self.strategy.decide(s, position.as_ref(), pool)?),
            None => None,
        };
        Ok(PoolMetrics {
            pool: pool.clone(),
            snapshot,
            position,
            decision,
            state: self.states.get(&pool.address).await,
            recent_rebalances: self.store.recent_rebalances(&pool.address, 5).await?,
        })
    }

    pub async fn pool_states(&self) -> HashMap<String, PoolRuntimeState> {
        self.states.all().await
    }
}
