use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clmm_rebalancer_domain::config::SkimThresholds;
use clmm_rebalancer_domain::entities::{
    NewPosition, NewRebalance, Position, PriceSnapshot, Rebalance, SkimEntry, SkimWalletStatus,
};
use clmm_rebalancer_domain::enums::{CloseReason, SkimAsset};
use rust_decimal::Decimal;

/// Read/write contract for positions, rebalance history, price history
/// and the skim wallet ledger.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Persists a newly opened position and returns its surrogate id.
    ///
    /// # Errors
    /// [`StoreError::Conflict`] if the protocol position id is already
    /// recorded or the pool already has an active position.
    async fn create_position(&self, position: &NewPosition) -> Result<i64, StoreError>;

    /// Most recently opened active position for the pool.
    async fn active_position(&self, pool_id: &str) -> Result<Option<Position>, StoreError>;

    /// All active positions across pools.
    async fn active_positions(&self) -> Result<Vec<Position>, StoreError>;

    async fn position(&self, id: i64) -> Result<Option<Position>, StoreError>;

    /// Marks a position closed. Closing a closed position is a no-op.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no position has this id.
    async fn close_position(&self, id: i64, reason: CloseReason) -> Result<(), StoreError>;

    async fn create_rebalance(&self, rebalance: &NewRebalance) -> Result<i64, StoreError>;

    /// Latest rebalances for the pool, newest first.
    async fn recent_rebalances(
        &self,
        pool_id: &str,
        limit: u32,
    ) -> Result<Vec<Rebalance>, StoreError>;

    async fn last_rebalance_at(&self, pool_id: &str)
    -> Result<Option<DateTime<Utc>>, StoreError>;

    async fn record_price_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError>;

    /// Appends a ledger entry and increments the running wallet balances
    /// by the entry's amounts in one transaction.
    async fn record_skim(&self, entry: &SkimEntry) -> Result<i64, StoreError>;

    async fn skim_wallet_status(
        &self,
        thresholds: &SkimThresholds,
    ) -> Result<SkimWalletStatus, StoreError>;

    /// Sets the last deposit alert time to now.
    async fn mark_deposit_alert_sent(&self) -> Result<(), StoreError>;

    /// Applies signed deltas to the running wallet balances.
    async fn update_skim_wallet_balance(
        &self,
        usdc_delta: Decimal,
        native_delta: Decimal,
    ) -> Result<(), StoreError>;

    /// Zeroes one asset's running balance and records the deposit.
    /// Returns the amount that was deposited.
    async fn record_deposit(&self, asset: SkimAsset) -> Result<Decimal, StoreError>;
}
