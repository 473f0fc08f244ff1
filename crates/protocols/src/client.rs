//! Boundary traits for the AMM, the chain and the oracle.

use crate::tx::{
    ClosePositionParams, CoinObject, CollectFeesParams, OpenPositionParams, PoolState,
    SubmitResult, SwapParams, Transaction, TxEffects,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors from the chain or AMM boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    /// Network-level failure, timeout or rate limit.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// The request was understood and refused.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The requested object does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The response could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ChainError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }
}

/// Errors from a price source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceSourceError {
    /// The source has no price for this pair. Expected for some pairs.
    #[error("price feed unavailable: {0}")]
    Unavailable(String),

    /// The source failed in a way that may clear up.
    #[error("transient price source error: {0}")]
    Transient(String),

    /// The request itself is wrong; other sources will fail the same way.
    #[error("fatal price source error: {0}")]
    Fatal(String),
}

impl From<ChainError> for PriceSourceError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Rpc(msg) => Self::Transient(msg),
            ChainError::NotFound(msg) => Self::Unavailable(msg),
            ChainError::Rejected(msg) | ChainError::Decode(msg) => Self::Transient(msg),
        }
    }
}

/// Reads pools and builds protocol transactions.
#[async_trait]
pub trait AmmClient: Send + Sync {
    /// Fetches live pool state.
    async fn pool_state(&self, pool: &str) -> Result<PoolState, ChainError>;

    /// Builds a transaction that opens a position and deposits liquidity.
    async fn build_open_position_tx(
        &self,
        params: &OpenPositionParams,
    ) -> Result<Transaction, ChainError>;

    /// Builds a transaction that removes all liquidity and closes a position.
    async fn build_close_position_tx(
        &self,
        params: &ClosePositionParams,
    ) -> Result<Transaction, ChainError>;

    /// Builds a fee collection transaction.
    async fn build_collect_fees_tx(
        &self,
        params: &CollectFeesParams,
    ) -> Result<Transaction, ChainError>;

    /// Builds a same-pool swap.
    async fn build_swap_tx(&self, params: &SwapParams) -> Result<Transaction, ChainError>;
}

/// Signs, simulates, submits and reads balances.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Address of the signing wallet.
    fn address(&self) -> &str;

    /// Dry-runs a transaction without committing state.
    async fn simulate(&self, tx: &Transaction) -> Result<TxEffects, ChainError>;

    /// Signs and executes a transaction, waiting for settlement.
    async fn submit(&self, tx: &Transaction) -> Result<SubmitResult, ChainError>;

    /// Total balance of `coin_type` held by `owner`, in base units.
    async fn balance(&self, owner: &str, coin_type: &str) -> Result<u128, ChainError>;

    /// Coin objects of `coin_type` owned by `owner`.
    async fn coins(&self, owner: &str, coin_type: &str) -> Result<Vec<CoinObject>, ChainError>;
}

/// Reference price feed keyed by pair label (e.g. `SUI/USDC`).
#[async_trait]
pub trait OracleClient: Send + Sync {
    async fn price(&self, pair: &str) -> Result<Decimal, PriceSourceError>;
}
