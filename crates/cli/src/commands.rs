//! Operator commands read from stdin while the engine is running.

use clmm_rebalancer_execution::prelude::*;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Pause(String),
    Resume(String),
    Rebalance(String),
    Close(String),
    Metrics(String),
    /// Runtime state of every pool.
    States,
    Help,
}

impl FromStr for OperatorCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let verb = parts
            .next()
            .ok_or_else(|| "empty command".to_string())?
            .to_ascii_lowercase();
        // Pool names such as "SUI / USDC" may contain spaces.
        let pool = parts.collect::<Vec<_>>().join(" ");

        let with_pool = |make: fn(String) -> Self| {
            if pool.is_empty() {
                Err(format!("usage: {verb} <pool>"))
            } else {
                Ok(make(pool.clone()))
            }
        };

        match verb.as_str() {
            "pause" => with_pool(Self::Pause),
            "resume" => with_pool(Self::Resume),
            "rebalance" => with_pool(Self::Rebalance),
            "close" => with_pool(Self::Close),
            "metrics" => with_pool(Self::Metrics),
            "states" | "status" => Ok(Self::States),
            "help" | "?" => Ok(Self::Help),
            other => Err(format!("unknown command '{other}', try 'help'")),
        }
    }
}

impl fmt::Display for OperatorCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause(pool) => write!(f, "pause {pool}"),
            Self::Resume(pool) => write!(f, "resume {pool}"),
            Self::Rebalance(pool) => write!(f, "rebalance {pool}"),
            Self::Close(pool) => write!(f, "close {pool}"),
            Self::Metrics(pool) => write!(f, "metrics {pool}"),
            Self::States => write!(f, "states"),
            Self::Help => write!(f, "help"),
        }
    }
}

pub const HELP: &str = "commands: pause <pool> | resume <pool> | rebalance <pool> | \
close <pool> | metrics <pool> | states | help";

/// Runs one operator command and renders its outcome.
pub async fn dispatch(orchestrator: &Orchestrator, command: &OperatorCommand) -> String {
    let result = match command {
        OperatorCommand::Pause(pool) => orchestrator.pause_pool(pool).await.map(|changed| {
            if changed {
                format!("{pool} paused")
            } else {
                format!("{pool} was already paused")
            }
        }),
        OperatorCommand::Resume(pool) => orchestrator.resume_pool(pool).await.map(|changed| {
            if changed {
                format!("{pool} resumed")
            } else {
                format!("{pool} was not paused")
            }
        }),
        OperatorCommand::Rebalance(pool) => orchestrator
            .manual_rebalance(pool)
            .await
            .map(|result| render_rebalance(&result)),
        OperatorCommand::Close(pool) => orchestrator.emergency_close(pool).await.map(|outcome| {
            format!(
                "{pool} closed: fees ${:.2}, gas {} base units, tx {}",
                outcome.fees.usd, outcome.gas_used, outcome.tx_digest
            )
        }),
        OperatorCommand::Metrics(pool) => orchestrator
            .pool_metrics(pool)
            .await
            .map(|metrics| render_metrics(&metrics)),
        OperatorCommand::States => Ok(render_states(orchestrator).await),
        OperatorCommand::Help => Ok(HELP.to_string()),
    };
    result.unwrap_or_else(|e| format!("{command} failed: {e}"))
}

pub fn render_rebalance(result: &RebalanceResult) -> String {
    let mut out = format!("rebalance {:?}", result.status);
    if let Some(position) = &result.new_position {
        out.push_str(&format!(
            ": new position {} [{}, {}], fees ${:.2}, skim {} USDC / {} native",
            position.position_id,
            position.range.lower,
            position.range.upper,
            result.fees.usd,
            result.skim.usdc_equivalent,
            result.skim.native_equivalent,
        ));
    }
    if let Some(error) = &result.error {
        out.push_str(&format!(" ({error})"));
    }
    out
}

pub fn render_metrics(metrics: &PoolMetrics) -> String {
    let mut lines = vec![format!("{} ({})", metrics.pool.name, metrics.pool.address)];
    match &metrics.snapshot {
        Some(s) => lines.push(format!(
            "  price {} via {} at {}, in range: {}",
            s.price, s.source, s.timestamp, s.in_range
        )),
        None => lines.push("  no price fetched yet".to_string()),
    }
    match &metrics.position {
        Some(p) => lines.push(format!(
            "  position {} [{}, {}] entry {} opened {}",
            p.position_id, p.range.lower, p.range.upper, p.entry_price, p.opened_at
        )),
        None => lines.push("  no active position".to_string()),
    }
    if let Some(decision) = &metrics.decision {
        lines.push(format!("  decision: {decision}"));
    }
    lines.push(format!(
        "  paused: {}, consecutive failures: {}",
        metrics.state.paused, metrics.state.consecutive_failures
    ));
    for r in &metrics.recent_rebalances {
        lines.push(format!(
            "  {} {} at {} fees ${:.2} tx {}",
            r.executed_at, r.trigger_reason, r.trigger_price, r.fees.usd, r.tx_digest
        ));
    }
    lines.join("\n")
}

async fn render_states(orchestrator: &Orchestrator) -> String {
    let states = orchestrator.pool_states().await;
    orchestrator
        .pools()
        .iter()
        .map(|pool| {
            let state = states.get(&pool.address).cloned().unwrap_or_default();
            let reason = state.pause_reason.as_deref().unwrap_or("-");
            format!(
                "{:<16} paused={} reason={} failures={}",
                pool.name, state.paused, reason, state.consecutive_failures
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
