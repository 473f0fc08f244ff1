//! Skim transfers, the skim ledger and deposit-ready alerts.

use crate::alerts::{Notification, Notifier, notify_quietly};
use crate::error::ExecutionError;
use chrono::{Duration as ChronoDuration, Utc};
use clmm_rebalancer_data::store::PositionStore;
use clmm_rebalancer_domain::config::{GlobalConfig, SkimConfig};
use clmm_rebalancer_domain::entities::{SkimEntry, SkimWalletStatus};
use clmm_rebalancer_domain::enums::SkimAsset;
use clmm_rebalancer_protocols::client::{ChainClient, ChainError};
use clmm_rebalancer_protocols::rpc::RetryPolicy;
use clmm_rebalancer_protocols::tx::{Transaction, TxCommand};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Transfer amounts after the partial-balance policy.
#[derive(Debug, Clone)]
struct PlannedTransfer {
    tx: Transaction,
    usdc_units: u64,
    native_units: u64,
}

/// Moves skimmed profit to the skim wallet and keeps the ledger.
pub struct SkimManager {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn PositionStore>,
    notifier: Arc<dyn Notifier>,
    skim: SkimConfig,
    usdc_coin_type: String,
    usdc_decimals: u8,
    native_decimals: u8,
    retry: RetryPolicy,
}

impl SkimManager {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn PositionStore>,
        notifier: Arc<dyn Notifier>,
        global: &GlobalConfig,
    ) -> Self {
        Self {
            chain,
            store,
            notifier,
            skim: global.skim.clone(),
            usdc_coin_type: global.usdc_coin_type.clone(),
            usdc_decimals: global.usdc_decimals,
            native_decimals: global.native_decimals,
            retry: RetryPolicy::from_config(&global.retry),
        }
    }

    /// Transfers up to `usdc` USDC and `native` native coin to the skim
    /// wallet and records the ledger entry.
    ///
    /// USDC is capped at what the wallet holds and the ledger gets the
    /// capped amount. The entry is written whether or not the transfer
    /// succeeds. Returns the digest of a successful transfer.
    pub async fn transfer_skim(
        &self,
        usdc: Decimal,
        native: Decimal,
        pool_id: &str,
        rebalance_id: Option<i64>,
    ) -> Option<String> {
        if usdc <= Decimal::ZERO && native <= Decimal::ZERO {
            return None;
        }
        let usdc = usdc.max(Decimal::ZERO);
        let native = native.max(Decimal::ZERO);

        if self.skim.wallet_address.is_empty() {
            warn!(pool = pool_id, %usdc, %native, "Skim wallet not configured, recording ledger only");
            self.record(pool_id, rebalance_id, usdc, native, None).await;
            return None;
        }

        let planned = match self.plan_transfer(usdc, native).await {
            Ok(planned) => planned,
            Err(e) => {
                error!(pool = pool_id, error = %e, "Failed to prepare skim transfer");
                self.record(pool_id, rebalance_id, usdc, native, None).await;
                return None;
            }
        };
        let usdc_sent = from_units(planned.usdc_units, self.usdc_decimals);
        let native_sent = from_units(planned.native_units, self.native_decimals);

        let digest = if planned.tx.is_empty() {
            None
        } else {
            match self.execute(&planned.tx).await {
                Ok(digest) => Some(digest),
                Err(e) => {
                    error!(pool = pool_id, usdc = %usdc_sent, native = %native_sent, error = %e, "Skim transfer failed");
                    None
                }
            }
        };

        if digest.is_some() {
            info!(
                pool = pool_id,
                usdc = %usdc_sent,
                native = %native_sent,
                tx_digest = ?digest,
                "Skim transferred"
            );
        }
        self.record(pool_id, rebalance_id, usdc_sent, native_sent, digest.clone())
            .await;
        digest
    }

    async fn plan_transfer(&self, usdc: Decimal, native: Decimal) -> Result<PlannedTransfer, ChainError> {
        let recipient = self.skim.wallet_address.clone();
        let mut tx = Transaction::new("skim_transfer");

        let native_units = to_units(native, self.native_decimals);
        if native_units > 0 {
            tx = tx.with_command(TxCommand::SplitGas {
                amount: native_units,
                recipient: recipient.clone(),
            });
        }

        let mut usdc_units = to_units(usdc, self.usdc_decimals);
        if usdc_units > 0 {
            let owner = self.chain.address();
            let coins = self
                .retry
                .run("coins", || self.chain.coins(owner, &self.usdc_coin_type))
                .await?;
            let available = coins
                .iter()
                .fold(0u64, |sum, coin| sum.saturating_add(coin.balance));
            if available < usdc_units {
                warn!(
                    requested = usdc_units,
                    available,
                    "Insufficient USDC for full skim, transferring what is available"
                );
                usdc_units = available;
            }

            if let Some((primary, others)) = coins.split_first()
                && usdc_units > 0
            {
                if !others.is_empty() {
                    tx = tx.with_command(TxCommand::MergeCoins {
                        primary: primary.object_id.clone(),
                        others: others.iter().map(|c| c.object_id.clone()).collect(),
                    });
                }
                tx = tx.with_command(TxCommand::SplitCoin {
                    coin: primary.object_id.clone(),
                    amount: usdc_units,
                    recipient,
                });
            }
        }

        Ok(PlannedTransfer {
            tx,
            usdc_units,
            native_units,
        })
    }

    async fn execute(&self, tx: &Transaction) -> Result<String, ExecutionError> {
        let simulated = self.retry.run("skim_simulate", || self.chain.simulate(tx)).await?;
        if let Some(reason) = simulated.failure() {
            return Err(ExecutionError::SimulationFailed {
                operation: "skim_transfer",
                reason,
            });
        }
        let result = self.chain.submit(tx).await?;
        if let Some(reason) = result.effects.failure() {
            return Err(ExecutionError::TransactionFailed {
                operation: "skim_transfer",
                reason,
                digest: Some(result.digest),
            });
        }
        Ok(result.digest)
    }

    async fn record(
        &self,
        pool_id: &str,
        rebalance_id: Option<i64>,
        usdc: Decimal,
        native: Decimal,
        tx_digest: Option<String>,
    ) {
        let entry = SkimEntry {
            pool_id: pool_id.to_string(),
            rebalance_id,
            usdc_amount: usdc,
            native_amount: native,
            tx_digest,
        };
        if let Err(e) = self.store.record_skim(&entry).await {
            error!(pool = pool_id, %usdc, %native, error = %e, "Failed to record skim ledger entry");
        }
    }

    /// Sends a deposit-ready alert when the skim wallet crossed a
    /// threshold and no alert went out within the cooldown. Returns
    /// whether an alert was sent.
    pub async fn check_deposit_threshold(&self) -> Result<bool, ExecutionError> {
        let status = self
            .store
            .skim_wallet_status(&self.skim.thresholds)
            .await?;
        if !status.ready_for_deposit {
            return Ok(false);
        }

        let cooldown = ChronoDuration::hours(self.skim.alert_cooldown_hours);
        if let Some(last) = status.last_alert_sent
            && Utc::now() - last < cooldown
        {
            return Ok(false);
        }

        notify_quietly(self.notifier.as_ref(), &Notification::DepositReady(status.clone())).await;
        self.store.mark_deposit_alert_sent().await?;
        info!(
            usdc = %status.usdc_balance,
            native = %status.native_balance,
            "Deposit alert sent"
        );
        Ok(true)
    }

    /// Confirms that `asset` was deposited and zeroes its running balance.
    /// Returns the amount that was cleared.
    pub async fn record_deposit(&self, asset: SkimAsset) -> Result<Decimal, ExecutionError> {
        let amount = self.store.record_deposit(asset).await?;
        info!(asset = %asset, %amount, "Deposit recorded");
        Ok(amount)
    }

    pub async fn deposit_status(&self) -> Result<SkimWalletStatus, ExecutionError> {
        Ok(self.store.skim_wallet_status(&self.skim.thresholds).await?)
    }
}

fn scale(decimals: u8) -> Decimal {
    Decimal::from(10u64.pow(u32::from(decimals.min(19))))
}

/// Whole base units, rounded down.
fn to_units(amount: Decimal, decimals: u8) -> u64 {
    (amount * scale(decimals)).floor().to_u64().unwrap_or(u64::MAX)
}

fn from_units(units: u64, decimals: u8) -> Decimal {
    Decimal::from(units) / scale(decimals)
}
