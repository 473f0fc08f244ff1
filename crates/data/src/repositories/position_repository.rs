//! Position persistence.

use super::columns::{millis, parsed, parsed_opt, timestamp, timestamp_opt};
use crate::error::StoreError;
use chrono::Utc;
use clmm_rebalancer_domain::entities::{NewPosition, Position};
use clmm_rebalancer_domain::enums::{CloseReason, PositionStatus};
use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

fn position_from_row(row: &SqliteRow) -> Result<Position, StoreError> {
    Ok(Position {
        id: row.try_get("id")?,
        pool_id: row.try_get("pool_id")?,
        position_id: row.try_get("position_id")?,
        tick_lower: row.try_get("tick_lower")?,
        tick_upper: row.try_get("tick_upper")?,
        range: PriceRange::new(parsed(row, "price_lower")?, parsed(row, "price_upper")?),
        liquidity: parsed(row, "liquidity")?,
        amount_a: parsed(row, "amount_a")?,
        amount_b: parsed(row, "amount_b")?,
        entry_price: parsed(row, "entry_price")?,
        entry_value_usd: parsed(row, "entry_value_usd")?,
        status: parsed(row, "status")?,
        opened_at: timestamp(row, "opened_at")?,
        closed_at: timestamp_opt(row, "closed_at")?,
        close_reason: parsed_opt(row, "close_reason")?,
    })
}

/// Repository for position rows.
#[derive(Clone)]
pub struct PositionRepository {
    pool: SqlitePool,
}

impl PositionRepository {
    /// Creates a new PositionRepository.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Inserts an active position.
    ///
    /// # Errors
    /// Returns [`StoreError::Conflict`] on a duplicate protocol id or a
    /// second active position for the pool.
    pub async fn insert(&self, position: &NewPosition) -> Result<i64, StoreError> {
        let result = sqlx::query(
            r"
            INSERT INTO positions (pool_id, position_id, tick_lower, tick_upper,
                                   price_lower, price_upper, liquidity, amount_a, amount_b,
                                   entry_price, entry_value_usd, status, opened_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ",
        )
        .bind(&position.pool_id)
        .bind(&position.position_id)
        .bind(position.tick_lower)
        .bind(position.tick_upper)
        .bind(position.range.lower.to_string())
        .bind(position.range.upper.to_string())
        .bind(position.liquidity.to_string())
        .bind(position.amount_a.to_string())
        .bind(position.amount_b.to_string())
        .bind(position.entry_price.to_string())
        .bind(position.entry_value_usd.to_string())
        .bind(PositionStatus::Active.as_str())
        .bind(millis(Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            StoreError::from_insert(e, || {
                format!(
                    "position {} or an active position for pool {} already exists",
                    position.position_id, position.pool_id
                )
            })
        })?;

        let id = result.last_insert_rowid();
        debug!(pool = %position.pool_id, position_id = %position.position_id, id, "Position stored");
        Ok(id)
    }

    /// Finds the most recently opened active position for a pool.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_active(&self, pool_id: &str) -> Result<Option<Position>, StoreError> {
        let row = sqlx::query(
            r"
            SELECT * FROM positions
            WHERE pool_id = ?1 AND status = 'active'
            ORDER BY opened_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(pool_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    /// Finds every active position.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_all_active(&self) -> Result<Vec<Position>, StoreError> {
        let rows = sqlx::query("SELECT * FROM positions WHERE status = 'active' ORDER BY pool_id")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(position_from_row).collect()
    }

    /// Finds a position by surrogate id.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<Position>, StoreError> {
        let row = sqlx::query("SELECT * FROM positions WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(position_from_row).transpose()
    }

    /// Closes an active position. Already-closed positions are left untouched.
    ///
    /// # Errors
    /// Returns [`StoreError::NotFound`] if the id does not exist.
    pub async fn close(&self, id: i64, reason: CloseReason) -> Result<(), StoreError> {
        let result = sqlx::query(
            r"
            UPDATE positions
            SET status = 'closed', closed_at = ?2, close_reason = ?3
            WHERE id = ?1 AND status = 'active'
            ",
        )
        .bind(id)
        .bind(millis(Utc::now()))
        .bind(reason.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.find_by_id(id).await?.is_none() {
            return Err(StoreError::NotFound(format!("position {}", id)));
        }
        Ok(())
    }
}
