//! Transaction and settlement model shared with the chain boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Live state of an AMM pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolState {
    /// Pool address.
    pub address: String,
    /// Spot price of token A in token B, derived from the pool's sqrt price.
    pub price: Decimal,
    /// Tick spacing.
    pub tick_spacing: i32,
    /// Current tick index.
    pub current_tick: i32,
    /// Fee rate in hundredths of a basis point.
    pub fee_rate: u32,
}

/// Parameters for opening a new position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPositionParams {
    /// Pool address.
    pub pool: String,
    /// Token A coin type.
    pub coin_type_a: String,
    /// Token B coin type.
    pub coin_type_b: String,
    /// Lower tick bound.
    pub tick_lower: i32,
    /// Upper tick bound.
    pub tick_upper: i32,
    /// Amount of token A to deposit.
    pub amount_a: u64,
    /// Amount of token B to deposit.
    pub amount_b: u64,
    /// Slippage tolerance in basis points.
    pub slippage_bps: u16,
}

/// Parameters for removing all liquidity and closing a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosePositionParams {
    /// Pool address.
    pub pool: String,
    /// Protocol position identifier.
    pub position_id: String,
    /// Token A coin type.
    pub coin_type_a: String,
    /// Token B coin type.
    pub coin_type_b: String,
    /// Whether to collect outstanding fees in the same transaction.
    pub collect_fees: bool,
    /// Slippage tolerance in basis points.
    pub slippage_bps: u16,
}

/// Parameters for collecting fees from a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectFeesParams {
    pub pool: String,
    pub position_id: String,
    pub coin_type_a: String,
    pub coin_type_b: String,
}

/// Parameters for a same-pool swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParams {
    pub pool: String,
    pub coin_type_a: String,
    pub coin_type_b: String,
    /// Direction: true swaps token A for token B.
    pub a_to_b: bool,
    /// Exact output amount wanted, in base units.
    pub amount_out: u64,
    pub slippage_bps: u16,
}

/// One step of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TxCommand {
    /// A protocol call prepared by the AMM client.
    Call {
        target: String,
        arguments: serde_json::Value,
    },
    /// Split `amount` off the gas coin and send it to `recipient`.
    SplitGas { amount: u64, recipient: String },
    /// Merge `others` into `primary`.
    MergeCoins { primary: String, others: Vec<String> },
    /// Split `amount` off `coin` and send it to `recipient`.
    SplitCoin {
        coin: String,
        amount: u64,
        recipient: String,
    },
}

/// An unsigned transaction. Signing happens at the chain boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Human-readable label used in logs.
    pub label: String,
    pub commands: Vec<TxCommand>,
}

impl Transaction {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            commands: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_command(mut self, command: TxCommand) -> Self {
        self.commands.push(command);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// Gas accounting in native base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GasSummary {
    pub computation_cost: u64,
    pub storage_cost: u64,
    pub storage_rebate: u64,
}

/// An object created by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedObject {
    pub object_id: String,
    pub object_type: String,
}

/// An event emitted by a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxEvent {
    pub event_type: String,
    #[serde(default)]
    pub fields: serde_json::Value,
}

/// Outcome of simulating or executing a transaction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TxEffects {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub gas: GasSummary,
    #[serde(default)]
    pub created: Vec<CreatedObject>,
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

impl TxEffects {
    /// Failure message, if the effects report one.
    pub fn failure(&self) -> Option<String> {
        if self.success {
            None
        } else {
            Some(
                self.error
                    .clone()
                    .unwrap_or_else(|| "transaction reported failure".to_string()),
            )
        }
    }
}

/// Result of submitting a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub digest: String,
    pub effects: TxEffects,
}

/// An owned coin object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoinObject {
    pub object_id: String,
    pub balance: u64,
}
