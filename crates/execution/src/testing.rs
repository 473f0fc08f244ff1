//! In-crate test doubles for the chain, AMM, oracle and notifier boundaries.

use crate::alerts::{Notification, Notifier};
use async_trait::async_trait;
use clmm_rebalancer_domain::config::{GlobalConfig, PoolConfig, RetryConfig, TokenInfo};
use clmm_rebalancer_domain::enums::RangeMode;
use clmm_rebalancer_protocols::client::{
    AmmClient, ChainClient, ChainError, OracleClient, PriceSourceError,
};
use clmm_rebalancer_protocols::tx::{
    ClosePositionParams, CoinObject, CollectFeesParams, CreatedObject, GasSummary,
    OpenPositionParams, PoolState, SubmitResult, SwapParams, Transaction, TxCommand, TxEffects,
    TxEvent,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

pub const POOL: &str = "0xpool";
pub const WALLET: &str = "0xwallet";
pub const SUI: &str = "0x2::sui::SUI";
pub const USDC: &str = "0xusdc::usdc::USDC";
pub const GAS_PER_TX: u64 = 2_000_000;

pub fn pool_config() -> PoolConfig {
    PoolConfig {
        address: POOL.to_string(),
        name: "SUI/USDC".to_string(),
        token_a: TokenInfo {
            address: SUI.to_string(),
            symbol: "SUI".to_string(),
            decimals: 9,
        },
        token_b: TokenInfo {
            address: USDC.to_string(),
            symbol: "USDC".to_string(),
            decimals: 6,
        },
        fee_tier: 2500,
        enabled: true,
        position_size_usd: dec!(1000),
        range_mode: RangeMode::Neutral,
        range_lower_bps: 1500,
        range_upper_bps: 1000,
        rebalance_threshold_pct: dec!(80),
        max_slippage_bps: 50,
        min_rebalance_interval_ms: 60_000,
    }
}

pub fn global_config() -> GlobalConfig {
    let mut config = GlobalConfig {
        native_coin_type: SUI.to_string(),
        usdc_coin_type: USDC.to_string(),
        retry: RetryConfig {
            max_retries: 2,
            base_delay_ms: 0,
            multiplier: 1,
        },
        ..GlobalConfig::default()
    };
    config.skim.wallet_address = "0xskim".to_string();
    config
}

fn tx(label: &str, params: impl serde::Serialize) -> Result<Transaction, ChainError> {
    let arguments = serde_json::to_value(params).map_err(|e| ChainError::Decode(e.to_string()))?;
    Ok(Transaction::new(label).with_command(TxCommand::Call {
        target: format!("pool::{}", label),
        arguments,
    }))
}

/// AMM double serving a fixed pool state.
pub struct MockAmm {
    state: Mutex<Option<PoolState>>,
    pub swaps: Mutex<Vec<SwapParams>>,
    pub opens: Mutex<Vec<OpenPositionParams>>,
}

impl MockAmm {
    pub fn new(price: Decimal) -> Self {
        Self {
            state: Mutex::new(Some(PoolState {
                address: POOL.to_string(),
                price,
                tick_spacing: 60,
                current_tick: 0,
                fee_rate: 2500,
            })),
            swaps: Mutex::new(Vec::new()),
            opens: Mutex::new(Vec::new()),
        }
    }

    pub fn set_price(&self, price: Decimal) {
        if let Some(state) = self.state.lock().unwrap().as_mut() {
            state.price = price;
        }
    }

    pub fn go_offline(&self) {
        *self.state.lock().unwrap() = None;
    }

    pub fn go_online(&self, price: Decimal) {
        *self.state.lock().unwrap() = Some(PoolState {
            address: POOL.to_string(),
            price,
            tick_spacing: 60,
            current_tick: 0,
            fee_rate: 2500,
        });
    }
}

#[async_trait]
impl AmmClient for MockAmm {
    async fn pool_state(&self, _pool: &str) -> Result<PoolState, ChainError> {
        self.state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ChainError::Rpc("connection refused".into()))
    }

    async fn build_open_position_tx(
        &self,
        params: &OpenPositionParams,
    ) -> Result<Transaction, ChainError> {
        self.opens.lock().unwrap().push(params.clone());
        tx("open_position", params)
    }

    async fn build_close_position_tx(
        &self,
        params: &ClosePositionParams,
    ) -> Result<Transaction, ChainError> {
        tx("close_position", params)
    }

    async fn build_collect_fees_tx(
        &self,
        params: &CollectFeesParams,
    ) -> Result<Transaction, ChainError> {
        tx("collect_fees", params)
    }

    async fn build_swap_tx(&self, params: &SwapParams) -> Result<Transaction, ChainError> {
        self.swaps.lock().unwrap().push(params.clone());
        tx("swap", params)
    }
}

#[derive(Default)]
struct ChainState {
    simulate_failures: HashSet<String>,
    submit_failures: HashSet<String>,
    unresolvable_ids: bool,
    fees: (u64, u64),
    balances: HashMap<String, u128>,
    coins: HashMap<String, Vec<CoinObject>>,
    simulated: Vec<String>,
    submitted: Vec<Transaction>,
    next_position: u32,
}

/// Chain double. Transactions are identified by label.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl Default for MockChain {
    fn default() -> Self {
        let mut state = ChainState::default();
        state.balances.insert(SUI.to_string(), 10_000_000_000);
        Self {
            state: Mutex::new(state),
        }
    }
}

impl MockChain {
    pub fn fail_simulation(&self, label: &str) {
        self.state
            .lock()
            .unwrap()
            .simulate_failures
            .insert(label.to_string());
    }

    pub fn fail_submit(&self, label: &str) {
        self.state
            .lock()
            .unwrap()
            .submit_failures
            .insert(label.to_string());
    }

    pub fn heal(&self) {
        let mut state = self.state.lock().unwrap();
        state.simulate_failures.clear();
        state.submit_failures.clear();
        state.unresolvable_ids = false;
    }

    /// Opens succeed but report no position id.
    pub fn hide_position_ids(&self) {
        self.state.lock().unwrap().unresolvable_ids = true;
    }

    pub fn set_fees(&self, amount_a: u64, amount_b: u64) {
        self.state.lock().unwrap().fees = (amount_a, amount_b);
    }

    pub fn set_balance(&self, coin_type: &str, amount: u128) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(coin_type.to_string(), amount);
    }

    pub fn set_coins(&self, coin_type: &str, balances: &[u64]) {
        let coins = balances
            .iter()
            .enumerate()
            .map(|(i, balance)| CoinObject {
                object_id: format!("0xcoin{}", i),
                balance: *balance,
            })
            .collect();
        self.state
            .lock()
            .unwrap()
            .coins
            .insert(coin_type.to_string(), coins);
    }

    pub fn submitted(&self) -> Vec<Transaction> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn submitted_labels(&self) -> Vec<String> {
        self.submitted().into_iter().map(|t| t.label).collect()
    }

    pub fn simulated_labels(&self) -> Vec<String> {
        self.state.lock().unwrap().simulated.clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    fn address(&self) -> &str {
        WALLET
    }

    async fn simulate(&self, tx: &Transaction) -> Result<TxEffects, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.simulated.push(tx.label.clone());
        if state.simulate_failures.contains(&tx.label) {
            return Ok(TxEffects {
                success: false,
                error: Some("MoveAbort: insufficient liquidity".into()),
                ..Default::default()
            });
        }
        Ok(TxEffects {
            success: true,
            ..Default::default()
        })
    }

    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, ChainError> {
        let mut state = self.state.lock().unwrap();
        state.submitted.push(tx.clone());
        let digest = format!("DIGEST{}", state.submitted.len());
        let gas = GasSummary {
            computation_cost: GAS_PER_TX,
            storage_cost: 0,
            storage_rebate: 0,
        };

        if state.submit_failures.contains(&tx.label) {
            return Ok(SubmitResult {
                digest,
                effects: TxEffects {
                    success: false,
                    error: Some("execution aborted".into()),
                    gas,
                    ..Default::default()
                },
            });
        }

        let mut effects = TxEffects {
            success: true,
            gas,
            ..Default::default()
        };
        match tx.label.as_str() {
            "open_position" if !state.unresolvable_ids => {
                state.next_position += 1;
                effects.created.push(CreatedObject {
                    object_id: format!("0xposition{}", state.next_position),
                    object_type: "0xclmm::position::Position".into(),
                });
                effects.events.push(TxEvent {
                    event_type: "0xclmm::pool::AddLiquidityEvent".into(),
                    fields: json!({ "liquidity": "1000000" }),
                });
            }
            "collect_fees" => {
                let (a, b) = state.fees;
                effects.events.push(TxEvent {
                    event_type: "0xclmm::pool::CollectFeeEvent".into(),
                    fields: json!({ "amount_a": a.to_string(), "amount_b": b.to_string() }),
                });
            }
            _ => {}
        }
        Ok(SubmitResult { digest, effects })
    }

    async fn balance(&self, _owner: &str, coin_type: &str) -> Result<u128, ChainError> {
        let state = self.state.lock().unwrap();
        if let Some(coins) = state.coins.get(coin_type) {
            return Ok(coins.iter().map(|c| u128::from(c.balance)).sum());
        }
        Ok(state.balances.get(coin_type).copied().unwrap_or(0))
    }

    async fn coins(&self, _owner: &str, coin_type: &str) -> Result<Vec<CoinObject>, ChainError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .coins
            .get(coin_type)
            .cloned()
            .unwrap_or_default())
    }
}

/// Oracle double keyed by pair label.
#[derive(Default)]
pub struct MockOracle {
    prices: Mutex<HashMap<String, Result<Decimal, PriceSourceError>>>,
}

impl MockOracle {
    pub fn set(&self, pair: &str, result: Result<Decimal, PriceSourceError>) {
        self.prices.lock().unwrap().insert(pair.to_string(), result);
    }
}

#[async_trait]
impl OracleClient for MockOracle {
    async fn price(&self, pair: &str) -> Result<Decimal, PriceSourceError> {
        self.prices
            .lock()
            .unwrap()
            .get(pair)
            .cloned()
            .unwrap_or_else(|| Err(PriceSourceError::Unavailable(pair.to_string())))
    }
}

/// Notifier that keeps everything it is sent.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn escalations(&self) -> usize {
        self.sent().iter().filter(|n| n.is_escalation()).count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
