//! Structured notifications and their Markdown rendering.

use chrono::Utc;
use clmm_rebalancer_domain::entities::SkimWalletStatus;
use clmm_rebalancer_domain::enums::TriggerReason;
use clmm_rebalancer_domain::math::skim::SkimAmount;
use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
use rust_decimal::Decimal;

/// Explorer prefix for transaction links.
pub const TX_EXPLORER_URL: &str = "https://suiscan.xyz/mainnet/tx/";

/// What a completed rebalance looked like.
#[derive(Debug, Clone, PartialEq)]
pub struct RebalanceSummary {
    pub pool_name: String,
    pub trigger_reason: TriggerReason,
    pub trigger_price: Decimal,
    pub old_range: PriceRange,
    pub new_range: PriceRange,
    pub fees_usd: Decimal,
    pub skim: SkimAmount,
    pub gas_used: Decimal,
    pub tx_digest: String,
}

/// An event worth telling the operator about.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    RebalanceExecuted(RebalanceSummary),
    PositionOpened {
        pool_name: String,
        position_id: String,
        range: PriceRange,
        tx_digest: String,
    },
    DepositReady(SkimWalletStatus),
    /// Needs a human. Sent for critical errors and auto-pauses.
    Escalation {
        kind: String,
        pool: Option<String>,
        message: String,
    },
    Text(String),
}

impl Notification {
    /// Whether this notification pages a human.
    pub fn is_escalation(&self) -> bool {
        matches!(self, Self::Escalation { .. })
    }

    /// Markdown body suitable for chat delivery.
    pub fn render(&self) -> String {
        match self {
            Self::RebalanceExecuted(r) => {
                let (edge, direction) = match r.trigger_reason {
                    TriggerReason::UpperBreach => ("upper", "Upward"),
                    TriggerReason::LowerBreach => ("lower", "Downward"),
                    TriggerReason::Manual => ("manual", "Operator"),
                };
                format!(
                    "*REBALANCE EXECUTED*\n\n\
                     *Pool:* {}\n\
                     *Trigger:* {} bound\n\
                     *Direction:* {}\n\
                     *Old Range:* ${} - ${}\n\
                     *New Range:* ${} - ${}\n\
                     *Current Price:* ${}\n\
                     *Fees Collected:* ${}\n\
                     *Skim Amount:* ${} USDC, {} native\n\
                     *Gas Used:* {}\n\
                     *TX:* {}{}",
                    r.pool_name,
                    edge,
                    direction,
                    r.old_range.lower.round_dp(4),
                    r.old_range.upper.round_dp(4),
                    r.new_range.lower.round_dp(4),
                    r.new_range.upper.round_dp(4),
                    r.trigger_price.round_dp(4),
                    r.fees_usd.round_dp(2),
                    r.skim.usdc_equivalent.round_dp(2),
                    r.skim.native_equivalent.round_dp(4),
                    r.gas_used,
                    TX_EXPLORER_URL,
                    r.tx_digest
                )
            }
            Self::PositionOpened {
                pool_name,
                position_id,
                range,
                tx_digest,
            } => format!(
                "*POSITION OPENED*\n\n*Pool:* {}\n*Position:* `{}`\n*Range:* ${} - ${}\n*TX:* {}{}",
                pool_name,
                position_id,
                range.lower.round_dp(4),
                range.upper.round_dp(4),
                TX_EXPLORER_URL,
                tx_digest
            ),
            Self::DepositReady(status) => {
                let mark = |ok: bool| if ok { "ready" } else { "below" };
                format!(
                    "*SKIM DEPOSIT READY*\n\n\
                     The skim wallet has reached a deposit threshold.\n\n\
                     *Balances:*\n\
                     - USDC: ${} ({}, threshold ${})\n\
                     - Native: {} ({}, threshold {})\n\n\
                     Confirm with `deposited --asset usdc|native` to reset tracking.",
                    status.usdc_balance.round_dp(2),
                    mark(status.usdc_balance >= status.usdc_threshold),
                    status.usdc_threshold,
                    status.native_balance.round_dp(2),
                    mark(status.native_balance >= status.native_threshold),
                    status.native_threshold
                )
            }
            Self::Escalation {
                kind,
                pool,
                message,
            } => {
                let pool_line = pool
                    .as_ref()
                    .map(|p| format!("*Pool:* {}\n", p))
                    .unwrap_or_default();
                format!(
                    "*ERROR ALERT*\n\n*Type:* {}\n{}*Time:* {}\n*Error:* {}\n\n*Action Required:* check system status and logs",
                    kind,
                    pool_line,
                    Utc::now().to_rfc3339(),
                    message
                )
            }
            Self::Text(text) => text.clone(),
        }
    }
}
