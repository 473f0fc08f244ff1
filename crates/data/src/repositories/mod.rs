//! SQLite repositories.
//!
//! One repository per table group, handed out by [`Database`], which
//! also implements [`PositionStore`] by delegating to them.

mod columns;
mod position_repository;
mod rebalance_repository;
mod skim_repository;
mod snapshot_repository;

pub use position_repository::PositionRepository;
pub use rebalance_repository::RebalanceRepository;
pub use skim_repository::SkimRepository;
pub use snapshot_repository::SnapshotRepository;

use crate::error::StoreError;
use crate::store::PositionStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use clmm_rebalancer_domain::config::SkimThresholds;
use clmm_rebalancer_domain::entities::{
    NewPosition, NewRebalance, Position, PriceSnapshot, Rebalance, SkimEntry, SkimWalletStatus,
};
use clmm_rebalancer_domain::enums::{CloseReason, SkimAsset};
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Database connection wrapper for repositories.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
    ledger_lock: Arc<Mutex<()>>,
}

impl Database {
    /// Wraps an existing pool. Does not run migrations.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            ledger_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Opens (creating if missing) the database at `database_url` and
    /// applies the schema.
    ///
    /// # Arguments
    /// * `database_url` - SQLite connection string, e.g. `sqlite://data/optimizer.db`
    ///
    /// # Errors
    /// Returns an error if the connection or migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        let db = Self::new(pool);
        db.migrate().await?;
        info!(database_url, "Store opened");
        Ok(db)
    }

    /// Creates a migrated in-memory database.
    ///
    /// A single connection is kept alive for the lifetime of the pool,
    /// since every new in-memory connection is a fresh empty database.
    ///
    /// # Errors
    /// Returns an error if the connection or migration fails.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        let db = Self::new(pool);
        db.migrate().await?;
        Ok(db)
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates a PositionRepository instance.
    #[must_use]
    pub fn positions(&self) -> PositionRepository {
        PositionRepository::new(self.pool.clone())
    }

    /// Creates a RebalanceRepository instance.
    #[must_use]
    pub fn rebalances(&self) -> RebalanceRepository {
        RebalanceRepository::new(self.pool.clone())
    }

    /// Creates a SnapshotRepository instance.
    #[must_use]
    pub fn snapshots(&self) -> SnapshotRepository {
        SnapshotRepository::new(self.pool.clone())
    }

    /// Creates a SkimRepository instance.
    #[must_use]
    pub fn skim(&self) -> SkimRepository {
        SkimRepository::new(self.pool.clone(), self.ledger_lock.clone())
    }

    /// Runs database migrations. Safe to run repeatedly.
    ///
    /// # Errors
    /// Returns an error if migrations fail.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("../../migrations/001_initial_schema.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PositionStore for Database {
    async fn create_position(&self, position: &NewPosition) -> Result<i64, StoreError> {
        self.positions().insert(position).await
    }

    async fn active_position(&self, pool_id: &str) -> Result<Option<Position>, StoreError> {
        self.positions().find_active(pool_id).await
    }

    async fn active_positions(&self) -> Result<Vec<Position>, StoreError> {
        self.positions().find_all_active().await
    }

    async fn position(&self, id: i64) -> Result<Option<Position>, StoreError> {
        self.positions().find_by_id(id).await
    }

    async fn close_position(&self, id: i64, reason: CloseReason) -> Result<(), StoreError> {
        self.positions().close(id, reason).await
    }

    async fn create_rebalance(&self, rebalance: &NewRebalance) -> Result<i64, StoreError> {
        self.rebalances().insert(rebalance).await
    }

    async fn recent_rebalances(
        &self,
        pool_id: &str,
        limit: u32,
    ) -> Result<Vec<Rebalance>, StoreError> {
        self.rebalances().find_recent(pool_id, limit).await
    }

    async fn last_rebalance_at(
        &self,
        pool_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        self.rebalances().last_executed_at(pool_id).await
    }

    async fn record_price_snapshot(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError> {
        self.snapshots().insert(snapshot).await
    }

    async fn record_skim(&self, entry: &SkimEntry) -> Result<i64, StoreError> {
        self.skim().record(entry).await
    }

    async fn skim_wallet_status(
        &self,
        thresholds: &SkimThresholds,
    ) -> Result<SkimWalletStatus, StoreError> {
        self.skim().status(thresholds).await
    }

    async fn mark_deposit_alert_sent(&self) -> Result<(), StoreError> {
        self.skim().mark_alert_sent().await
    }

    async fn update_skim_wallet_balance(
        &self,
        usdc_delta: Decimal,
        native_delta: Decimal,
    ) -> Result<(), StoreError> {
        self.skim().adjust(usdc_delta, native_delta).await
    }

    async fn record_deposit(&self, asset: SkimAsset) -> Result<Decimal, StoreError> {
        self.skim().record_deposit(asset).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clmm_rebalancer_domain::entities::FeesCollected;
    use clmm_rebalancer_domain::enums::{PositionStatus, TriggerReason};
    use clmm_rebalancer_domain::math::skim::SkimAmount;
    use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn new_position(pool: &str, protocol_id: &str) -> NewPosition {
        NewPosition {
            pool_id: pool.to_string(),
            position_id: protocol_id.to_string(),
            tick_lower: -1620,
            tick_upper: 960,
            range: PriceRange::new(dec!(0.85), dec!(1.10)),
            liquidity: 123_456_789_012_345_678_901_234,
            amount_a: u64::MAX,
            amount_b: 42,
            entry_price: dec!(1.00),
            entry_value_usd: dec!(1000),
        }
    }

    fn new_rebalance(pool: &str, old: i64, new: i64) -> NewRebalance {
        NewRebalance {
            pool_id: pool.to_string(),
            old_position_id: old,
            new_position_id: new,
            trigger_price: dec!(1.085),
            trigger_reason: TriggerReason::UpperBreach,
            old_range: PriceRange::new(dec!(0.85), dec!(1.10)),
            new_range: PriceRange::new(dec!(1.06), dec!(1.12)),
            fees: FeesCollected {
                amount_a: 10,
                amount_b: 20,
                usd: dec!(3.5),
            },
            skim: SkimAmount {
                usdc_equivalent: dec!(0.245),
                native_equivalent: dec!(0.105),
            },
            gas_used: dec!(0.0042),
            tx_digest: "DIGEST".to_string(),
        }
    }

    #[tokio::test]
    async fn test_position_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_position(&new_position("pool-1", "0xpos1")).await.unwrap();

        let stored = db.position(id).await.unwrap().unwrap();
        assert_eq!(stored.status, PositionStatus::Active);
        assert_eq!(stored.amount_a, u64::MAX);
        assert_eq!(stored.liquidity, 123_456_789_012_345_678_901_234);
        assert_eq!(stored.range.upper, dec!(1.10));
        assert!(stored.closed_at.is_none());

        let active = db.active_position("pool-1").await.unwrap().unwrap();
        assert_eq!(active.id, id);
        assert!(db.active_position("pool-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_protocol_id_conflicts() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_position(&new_position("pool-1", "0xpos1")).await.unwrap();
        db.close_position(id, CloseReason::Manual).await.unwrap();

        let err = db
            .create_position(&new_position("pool-2", "0xpos1"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_second_active_position_conflicts() {
        let db = Database::in_memory().await.unwrap();
        db.create_position(&new_position("pool-1", "0xa")).await.unwrap();
        let err = db
            .create_position(&new_position("pool-1", "0xb"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let id = db.create_position(&new_position("pool-1", "0xa")).await.unwrap();

        db.close_position(id, CloseReason::Rebalance).await.unwrap();
        let first = db.position(id).await.unwrap().unwrap();

        db.close_position(id, CloseReason::Emergency).await.unwrap();
        let second = db.position(id).await.unwrap().unwrap();

        assert_eq!(first, second);
        assert_eq!(second.status, PositionStatus::Closed);
        assert_eq!(second.close_reason, Some(CloseReason::Rebalance));
        assert!(second.closed_at.is_some());
        assert!(db.active_position("pool-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_unknown_position() {
        let db = Database::in_memory().await.unwrap();
        assert!(matches!(
            db.close_position(99, CloseReason::Manual).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_randomized_open_close_keeps_one_active_per_pool() {
        let db = Database::in_memory().await.unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let pools = ["pool-a", "pool-b", "pool-c"];
        let mut model: HashMap<&str, i64> = HashMap::new();

        for step in 0..200 {
            let pool = pools[rng.random_range(0..pools.len())];
            if rng.random_bool(0.5) {
                let result = db
                    .create_position(&new_position(pool, &format!("0x{}", step)))
                    .await;
                match model.get(pool) {
                    Some(_) => assert!(matches!(result, Err(StoreError::Conflict(_)))),
                    None => {
                        model.insert(pool, result.unwrap());
                    }
                }
            } else if let Some(id) = model.remove(pool) {
                db.close_position(id, CloseReason::Rebalance).await.unwrap();
            }

            for pool in pools {
                let active = db.active_position(pool).await.unwrap().map(|p| p.id);
                assert_eq!(active, model.get(pool).copied());
                let (count,): (i64,) = sqlx::query_as(
                    "SELECT COUNT(*) FROM positions WHERE pool_id = ?1 AND status = 'active'",
                )
                .bind(pool)
                .fetch_one(db.pool())
                .await
                .unwrap();
                assert!(count <= 1);
            }
        }
        assert_eq!(db.active_positions().await.unwrap().len(), model.len());
    }

    #[tokio::test]
    async fn test_rebalance_history() {
        let db = Database::in_memory().await.unwrap();
        let old = db.create_position(&new_position("pool-1", "0xold")).await.unwrap();
        db.close_position(old, CloseReason::Rebalance).await.unwrap();
        let new = db.create_position(&new_position("pool-1", "0xnew")).await.unwrap();

        assert!(db.last_rebalance_at("pool-1").await.unwrap().is_none());
        let id = db.create_rebalance(&new_rebalance("pool-1", old, new)).await.unwrap();

        let history = db.recent_rebalances("pool-1", 10).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, id);
        assert_eq!(history[0].new_position_id, new);
        assert_eq!(history[0].skim.usdc_equivalent, dec!(0.245));
        assert_eq!(history[0].trigger_reason, TriggerReason::UpperBreach);
        assert!(db.last_rebalance_at("pool-1").await.unwrap().is_some());
        assert!(db.recent_rebalances("pool-2", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rebalance_requires_existing_positions() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.create_rebalance(&new_rebalance("pool-1", 1, 2)).await.is_err());
    }

    #[tokio::test]
    async fn test_price_snapshot_history() {
        let db = Database::in_memory().await.unwrap();
        let snapshot = PriceSnapshot {
            pool_id: "pool-1".into(),
            price: dec!(1.02),
            in_range: true,
            distance_to_lower: dec!(68),
            distance_to_upper: dec!(32),
            source: "pool".into(),
            timestamp: Utc::now(),
        };
        db.record_price_snapshot(&snapshot).await.unwrap();
        db.record_price_snapshot(&snapshot).await.unwrap();
        assert_eq!(db.snapshots().count("pool-1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_skim_ledger_increments_balance() {
        let db = Database::in_memory().await.unwrap();
        let thresholds = SkimThresholds::default();

        for pool in ["pool-1", "pool-2"] {
            db.record_skim(&SkimEntry {
                pool_id: pool.into(),
                rebalance_id: None,
                usdc_amount: dec!(30),
                native_amount: dec!(4),
                tx_digest: None,
            })
            .await
            .unwrap();
        }

        let status = db.skim_wallet_status(&thresholds).await.unwrap();
        assert_eq!(status.usdc_balance, dec!(60));
        assert_eq!(status.native_balance, dec!(8));
        assert!(status.ready_for_deposit);
        assert!(status.last_alert_sent.is_none());

        db.mark_deposit_alert_sent().await.unwrap();
        let status = db.skim_wallet_status(&thresholds).await.unwrap();
        assert!(status.last_alert_sent.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_skims_do_not_lose_updates() {
        let db = Database::in_memory().await.unwrap();
        let mut handles = Vec::new();
        for i in 0..20 {
            let db = db.clone();
            handles.push(tokio::spawn(async move {
                db.record_skim(&SkimEntry {
                    pool_id: format!("pool-{}", i % 3),
                    rebalance_id: None,
                    usdc_amount: dec!(1.5),
                    native_amount: dec!(0.25),
                    tx_digest: Some(format!("tx{}", i)),
                })
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let status = db.skim_wallet_status(&SkimThresholds::default()).await.unwrap();
        assert_eq!(status.usdc_balance, dec!(30));
        assert_eq!(status.native_balance, dec!(5));
    }

    #[tokio::test]
    async fn test_deposit_zeroes_one_asset() {
        let db = Database::in_memory().await.unwrap();
        db.update_skim_wallet_balance(dec!(55), dec!(21)).await.unwrap();

        let deposited = db.record_deposit(SkimAsset::Usdc).await.unwrap();
        assert_eq!(deposited, dec!(55));

        let status = db.skim_wallet_status(&SkimThresholds::default()).await.unwrap();
        assert_eq!(status.usdc_balance, Decimal::ZERO);
        assert_eq!(status.native_balance, dec!(21));

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM deposits")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("store.db").display());

        let db = Database::connect(&url).await.unwrap();
        let id = db.create_position(&new_position("pool-1", "0xa")).await.unwrap();
        db.close().await;

        let reopened = Database::connect(&url).await.unwrap();
        let active = reopened.active_position("pool-1").await.unwrap().unwrap();
        assert_eq!(active.id, id);
    }
}
