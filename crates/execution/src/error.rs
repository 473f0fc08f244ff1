use clmm_rebalancer_data::error::StoreError;
use clmm_rebalancer_domain::error::MathError;
use clmm_rebalancer_protocols::client::ChainError;
use thiserror::Error;

/// Errors raised by the execution engine.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Pool or process configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Every price source failed for the pool.
    #[error("price unavailable for {pool}: {reason}")]
    PriceUnavailable { pool: String, reason: String },

    /// Another operation holds the pool's in-flight guard.
    #[error("another operation is in flight for pool {0}")]
    ConcurrentOperation(String),

    /// The pool already has an active position.
    #[error("pool {pool} already has active position {position_id}")]
    PositionAlreadyActive { pool: String, position_id: String },

    /// Simulation rejected a transaction; nothing was executed.
    #[error("{operation} simulation failed: {reason}")]
    SimulationFailed {
        operation: &'static str,
        reason: String,
    },

    /// A submitted transaction failed on chain.
    #[error("{operation} transaction failed: {reason}")]
    TransactionFailed {
        operation: &'static str,
        reason: String,
        digest: Option<String>,
    },

    /// A position was opened on chain but its id could not be extracted,
    /// so it is not tracked.
    #[error("position opened in tx {digest} for pool {pool} but its id could not be resolved")]
    PositionIdUnresolved { pool: String, digest: String },

    /// Computed token amount does not fit the chain's integer width.
    #[error("amount {amount} for {token} overflows u64")]
    AmountOverflow { token: String, amount: String },

    /// The old position was closed and no new position could be confirmed.
    #[error("pool {pool} closed position {closed_position} but no new position was confirmed: {reason}")]
    CriticalDangerWindow {
        pool: String,
        closed_position: String,
        reason: String,
    },

    /// A rebalance attempt failed before the danger window.
    #[error("rebalance failed: {0}")]
    RebalanceFailed(String),

    #[error(transparent)]
    Math(MathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl From<MathError> for ExecutionError {
    fn from(e: MathError) -> Self {
        match e {
            MathError::AmountOverflow { token, amount } => Self::AmountOverflow { token, amount },
            other => Self::Math(other),
        }
    }
}

impl ExecutionError {
    /// Escalation-grade errors that need a human.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            Self::CriticalDangerWindow { .. } | Self::PositionIdUnresolved { .. }
        )
    }
}
