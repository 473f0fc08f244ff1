//! Pure rebalance decision over a price snapshot and the active position.

use clmm_rebalancer_domain::config::PoolConfig;
use clmm_rebalancer_domain::entities::{Position, PriceSnapshot};
use clmm_rebalancer_domain::enums::TriggerReason;
use clmm_rebalancer_domain::error::MathError;
use clmm_rebalancer_domain::math::range::{compute_range, should_trigger_rebalance};
use clmm_rebalancer_domain::value_objects::price_range::PriceRange;
use std::fmt;

/// Outcome of evaluating one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Leave the position as it is.
    Hold,
    /// Close and reopen around the current price.
    Rebalance {
        trigger_reason: TriggerReason,
        new_range: PriceRange,
    },
}

impl Decision {
    pub fn should_rebalance(&self) -> bool {
        matches!(self, Self::Rebalance { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hold => write!(f, "hold"),
            Self::Rebalance {
                trigger_reason,
                new_range,
            } => write!(
                f,
                "rebalance ({}) to [{}, {}]",
                trigger_reason, new_range.lower, new_range.upper
            ),
        }
    }
}

/// Stateless decision engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrategyEngine;

impl StrategyEngine {
    /// Decides whether `position` must be rebalanced at the snapshot price.
    ///
    /// Without an active position the answer is always [`Decision::Hold`];
    /// opening the first position is a separate path.
    ///
    /// # Errors
    /// Returns [`MathError`] only when the pool's range offsets cannot
    /// produce a range, which validated configuration rules out.
    pub fn decide(
        &self,
        snapshot: &PriceSnapshot,
        position: Option<&Position>,
        pool: &PoolConfig,
    ) -> Result<Decision, MathError> {
        let Some(position) = position else {
            return Ok(Decision::Hold);
        };
        let price = snapshot.price;
        let range = &position.range;

        if !should_trigger_rebalance(price, range, pool.threshold_fraction()) {
            return Ok(Decision::Hold);
        }

        let trigger_reason = if price - range.lower < range.upper - price {
            TriggerReason::LowerBreach
        } else {
            TriggerReason::UpperBreach
        };
        let new_range = compute_range(price, pool.range_lower_bps, pool.range_upper_bps)?;

        Ok(Decision::Rebalance {
            trigger_reason,
            new_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clmm_rebalancer_domain::enums::PositionStatus;
    use clmm_rebalancer_domain::enums::RangeMode;
    use clmm_rebalancer_domain::config::TokenInfo;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn pool() -> PoolConfig {
        let token = |symbol: &str| TokenInfo {
            address: format!("0x{}", symbol.to_lowercase()),
            symbol: symbol.to_string(),
            decimals: 6,
        };
        PoolConfig {
            address: "0xpool".into(),
            name: "SUI/USDC".into(),
            token_a: token("SUI"),
            token_b: token("USDC"),
            fee_tier: 2500,
            enabled: true,
            position_size_usd: dec!(1000),
            range_mode: RangeMode::Neutral,
            range_lower_bps: 150,
            range_upper_bps: 250,
            rebalance_threshold_pct: dec!(80),
            max_slippage_bps: 50,
            min_rebalance_interval_ms: 0,
        }
    }

    fn position(lower: Decimal, upper: Decimal) -> Position {
        Position {
            id: 1,
            pool_id: "0xpool".into(),
            position_id: "0xposition".into(),
            tick_lower: 0,
            tick_upper: 0,
            range: PriceRange::new(lower, upper),
            liquidity: 1,
            amount_a: 1,
            amount_b: 1,
            entry_price: dec!(1),
            entry_value_usd: dec!(1000),
            status: PositionStatus::Active,
            opened_at: Utc::now(),
            closed_at: None,
            close_reason: None,
        }
    }

    fn snapshot(price: Decimal) -> PriceSnapshot {
        PriceSnapshot {
            pool_id: "0xpool".into(),
            price,
            in_range: true,
            distance_to_lower: Decimal::ZERO,
            distance_to_upper: Decimal::ZERO,
            source: "pool".into(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_hold_without_position() {
        let decision = StrategyEngine.decide(&snapshot(dec!(5)), None, &pool()).unwrap();
        assert_eq!(decision, Decision::Hold);
    }

    #[test]
    fn test_upper_breach_near_upper_edge() {
        let position = position(dec!(0.85), dec!(1.10));
        let decision = StrategyEngine
            .decide(&snapshot(dec!(1.085)), Some(&position), &pool())
            .unwrap();

        assert!(decision.should_rebalance());
        match decision {
            Decision::Rebalance {
                trigger_reason,
                new_range,
            } => {
                assert_eq!(trigger_reason, TriggerReason::UpperBreach);
                assert_eq!(new_range.lower, dec!(1.085) * dec!(0.985));
                assert_eq!(new_range.upper, dec!(1.085) * dec!(1.025));
            }
            Decision::Hold => unreachable!(),
        }
    }

    #[test]
    fn test_lower_breach_near_lower_edge() {
        let position = position(dec!(0.85), dec!(1.10));
        let decision = StrategyEngine
            .decide(&snapshot(dec!(0.86)), Some(&position), &pool())
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Rebalance {
                trigger_reason: TriggerReason::LowerBreach,
                ..
            }
        ));
    }

    #[test]
    fn test_hold_in_middle_of_range() {
        let position = position(dec!(0.85), dec!(1.10));
        let decision = StrategyEngine
            .decide(&snapshot(dec!(0.975)), Some(&position), &pool())
            .unwrap();
        assert_eq!(decision, Decision::Hold);
        assert_eq!(decision.to_string(), "hold");
    }

    #[test]
    fn test_out_of_range_triggers() {
        let position = position(dec!(0.85), dec!(1.10));
        let decision = StrategyEngine
            .decide(&snapshot(dec!(1.30)), Some(&position), &pool())
            .unwrap();
        assert!(matches!(
            decision,
            Decision::Rebalance {
                trigger_reason: TriggerReason::UpperBreach,
                ..
            }
        ));
    }

    #[test]
    fn test_degenerate_position_range_triggers() {
        let position = position(dec!(1), dec!(1));
        let decision = StrategyEngine
            .decide(&snapshot(dec!(1)), Some(&position), &pool())
            .unwrap();
        assert!(decision.should_rebalance());
    }
}
