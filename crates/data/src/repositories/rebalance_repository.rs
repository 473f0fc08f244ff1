//! Rebalance history persistence. Rows are append-only.

use super::columns::{millis, parsed, timestamp, timestamp_opt};
use crate::error::StoreError;
use chrono::{DateTime, Utc};
use clmm_rebalancer_domain::entities::{FeesCollected, NewRebalance, Rebalance};
use clmm_rebalancer_domain::math::skim::SkimAmount;
use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

fn rebalance_from_row(row: &SqliteRow) -> Result<Rebalance, StoreError> {
    Ok(Rebalance {
        id: row.try_get("id")?,
        pool_id: row.try_get("pool_id")?,
        old_position_id: row.try_get("old_position_id")?,
        new_position_id: row.try_get("new_position_id")?,
        trigger_price: parsed(row, "trigger_price")?,
        trigger_reason: parsed(row, "trigger_reason")?,
        old_range: PriceRange::new(parsed(row, "old_lower")?, parsed(row, "old_upper")?),
        new_range: PriceRange::new(parsed(row, "new_lower")?, parsed(row, "new_upper")?),
        fees: FeesCollected {
            amount_a: parsed(row, "fees_a")?,
            amount_b: parsed(row, "fees_b")?,
            usd: parsed(row, "fees_usd")?,
        },
        skim: SkimAmount {
            usdc_equivalent: parsed(row, "skim_usdc")?,
            native_equivalent: parsed(row, "skim_native")?,
        },
        gas_used: parsed(row, "gas_used")?,
        tx_digest: row.try_get("tx_digest")?,
        executed_at: timestamp(row, "executed_at")?,
    })
}

/// Repository for rebalance rows.
#[derive(Clone)]
pub struct RebalanceRepository {
    pool: SqlitePool,
}

impl RebalanceRepository {
    /// Creates a new RebalanceRepository.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Appends a rebalance.
    ///
    /// # Errors
    /// Returns an error if the insert fails, including when either
    /// position id does not exist.
    pub async fn insert(&self, rebalance: &NewRebalance) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO rebalances (pool_id, old_position_id, new_position_id, trigger_price,
                                    trigger_reason, old_lower, old_upper, new_lower, new_upper,
                                    fees_a, fees_b, fees_usd, skim_usdc, skim_native,
                                    gas_used, tx_digest, executed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            ",
        )
        .bind(&rebalance.pool_id)
        .bind(rebalance.old_position_id)
        .bind(rebalance.new_position_id)
        .bind(rebalance.trigger_price.to_string())
        .bind(rebalance.trigger_reason.as_str())
        .bind(rebalance.old_range.lower.to_string())
        .bind(rebalance.old_range.upper.to_string())
        .bind(rebalance.new_range.lower.to_string())
        .bind(rebalance.new_range.upper.to_string())
        .bind(rebalance.fees.amount_a.to_string())
        .bind(rebalance.fees.amount_b.to_string())
        .bind(rebalance.fees.usd.to_string())
        .bind(rebalance.skim.usdc_equivalent.to_string())
        .bind(rebalance.skim.native_equivalent.to_string())
        .bind(rebalance.gas_used.to_string())
        .bind(&rebalance.tx_digest)
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Latest rebalances for a pool, newest first.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_recent(&self, pool_id: &str, limit: u32) -> Result<Vec<Rebalance>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT * FROM rebalances
            WHERE pool_id = ?1
            ORDER BY executed_at DESC, id DESC
            LIMIT ?2
            ",
        )
        .bind(pool_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(rebalance_from_row).collect()
    }

    /// Time of the pool's latest rebalance.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn last_executed_at(
        &self,
        pool_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query("SELECT MAX(executed_at) AS last FROM rebalances WHERE pool_id = ?1")
            .bind(pool_id)
            .fetch_one(&self.pool)
            .await?;
        timestamp_opt(&row, "last")
    }
}
