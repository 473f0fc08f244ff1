//! Skim ledger, running wallet balance and deposit records.
//!
//! The running balance is a single row. Every mutation reads and writes
//! it inside one transaction while holding the ledger lock, so
//! interleaved skims from different pools cannot lose an increment.

use super::columns::{millis, parsed, timestamp_opt};
use crate::error::StoreError;
use chrono::Utc;
use clmm_rebalancer_domain::config::SkimThresholds;
use clmm_rebalancer_domain::entities::{SkimEntry, SkimWalletStatus};
use clmm_rebalancer_domain::enums::SkimAsset;
use rust_decimal::Decimal;
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Running balances as stored.
struct Balances {
    usdc: Decimal,
    native: Decimal,
}

async fn read_balances(tx: &mut Transaction<'_, Sqlite>) -> Result<Balances, StoreError> {
    let row = sqlx::query("SELECT usdc_balance, native_balance FROM skim_wallet_balance WHERE id = 1")
        .fetch_one(&mut **tx)
        .await?;
    Ok(Balances {
        usdc: parsed(&row, "usdc_balance")?,
        native: parsed(&row, "native_balance")?,
    })
}

async fn write_balances(
    tx: &mut Transaction<'_, Sqlite>,
    balances: &Balances,
) -> Result<(), StoreError> {
    sqlx::query(
        "UPDATE skim_wallet_balance SET usdc_balance = ?1, native_balance = ?2, updated_at = ?3 WHERE id = 1",
    )
    .bind(balances.usdc.to_string())
    .bind(balances.native.to_string())
    .bind(millis(Utc::now()))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Repository for the skim ledger and wallet balance.
#[derive(Clone)]
pub struct SkimRepository {
    pool: SqlitePool,
    ledger_lock: Arc<Mutex<()>>,
}

impl SkimRepository {
    /// Creates a repository sharing `ledger_lock` with every other
    /// handle on the same database.
    #[must_use]
    pub fn new(pool: SqlitePool, ledger_lock: Arc<Mutex<()>>) -> Self {
        Self { pool, ledger_lock }
    }

    /// Appends a ledger entry and adds its amounts to the running balance.
    ///
    /// # Errors
    /// Returns an error if the transaction fails; nothing is written then.
    pub async fn record(&self, entry: &SkimEntry) -> Result<i64, StoreError> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            INSERT INTO skim_ledger (pool_id, rebalance_id, usdc_amount, native_amount,
                                     tx_digest, recorded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(&entry.pool_id)
        .bind(entry.rebalance_id)
        .bind(entry.usdc_amount.to_string())
        .bind(entry.native_amount.to_string())
        .bind(entry.tx_digest.as_deref())
        .bind(millis(Utc::now()))
        .execute(&mut *tx)
        .await?;

        let mut balances = read_balances(&mut tx).await?;
        balances.usdc += entry.usdc_amount;
        balances.native += entry.native_amount;
        write_balances(&mut tx, &balances).await?;

        tx.commit().await?;
        Ok(result.last_insert_rowid())
    }

    /// Current balances evaluated against `thresholds`.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn status(&self, thresholds: &SkimThresholds) -> Result<SkimWalletStatus, StoreError> {
        let row = sqlx::query(
            "SELECT usdc_balance, native_balance, last_alert_sent FROM skim_wallet_balance WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(SkimWalletStatus::from_balances(
            parsed(&row, "usdc_balance")?,
            parsed(&row, "native_balance")?,
            thresholds.usdc,
            thresholds.native,
            timestamp_opt(&row, "last_alert_sent")?,
        ))
    }

    /// Stamps the deposit alert time.
    ///
    /// # Errors
    /// Returns an error if the update fails.
    pub async fn mark_alert_sent(&self) -> Result<(), StoreError> {
        sqlx::query("UPDATE skim_wallet_balance SET last_alert_sent = ?1 WHERE id = 1")
            .bind(millis(Utc::now()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Adds signed deltas to the running balance.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn adjust(&self, usdc_delta: Decimal, native_delta: Decimal) -> Result<(), StoreError> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut balances = read_balances(&mut tx).await?;
        balances.usdc += usdc_delta;
        balances.native += native_delta;
        write_balances(&mut tx, &balances).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Zeroes the asset's balance and appends a deposit row.
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn record_deposit(&self, asset: SkimAsset) -> Result<Decimal, StoreError> {
        let _guard = self.ledger_lock.lock().await;
        let mut tx = self.pool.begin().await?;
        let mut balances = read_balances(&mut tx).await?;

        let amount = match asset {
            SkimAsset::Usdc => std::mem::replace(&mut balances.usdc, Decimal::ZERO),
            SkimAsset::Native => std::mem::replace(&mut balances.native, Decimal::ZERO),
        };
        write_balances(&mut tx, &balances).await?;

        sqlx::query("INSERT INTO deposits (asset, amount, deposited_at) VALUES (?1, ?2, ?3)")
            .bind(asset.as_str())
            .bind(amount.to_string())
            .bind(millis(Utc::now()))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!(asset = %asset, %amount, "Deposit recorded");
        Ok(amount)
    }
}
