//! Price snapshot history.

use super::columns::millis;
use crate::error::StoreError;
use clmm_rebalancer_domain::entities::PriceSnapshot;
use sqlx::SqlitePool;

/// Repository for price history rows.
#[derive(Clone)]
pub struct SnapshotRepository {
    pool: SqlitePool,
}

impl SnapshotRepository {
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a snapshot.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub async fn insert(&self, snapshot: &PriceSnapshot) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO price_snapshots (pool_id, price, in_range, distance_to_lower,
                                         distance_to_upper, source, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(&snapshot.pool_id)
        .bind(snapshot.price.to_string())
        .bind(snapshot.in_range)
        .bind(snapshot.distance_to_lower.to_string())
        .bind(snapshot.distance_to_upper.to_string())
        .bind(&snapshot.source)
        .bind(millis(snapshot.timestamp))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Number of snapshots stored for a pool.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn count(&self, pool_id: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM price_snapshots WHERE pool_id = ?1")
                .bind(pool_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
