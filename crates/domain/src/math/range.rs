//! Range construction and position-in-range measurements.

use crate::error::MathError;
use crate::value_objects::price_range::PriceRange;
use rust_decimal::Decimal;

const BPS_DENOMINATOR: Decimal = Decimal::from_parts(10_000, 0, 0, false, 0);
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Distance from the current price to each range edge, as a percentage
/// of the range width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeDistances {
    pub to_lower_pct: Decimal,
    pub to_upper_pct: Decimal,
}

impl RangeDistances {
    pub const ZERO: Self = Self {
        to_lower_pct: Decimal::ZERO,
        to_upper_pct: Decimal::ZERO,
    };
}

/// Builds a new range around `current_price` from basis-point offsets.
///
/// `lower = price * (1 - lower_bps / 10000)`,
/// `upper = price * (1 + upper_bps / 10000)`.
pub fn compute_range(
    current_price: Decimal,
    lower_bps: u32,
    upper_bps: u32,
) -> Result<PriceRange, MathError> {
    if current_price <= Decimal::ZERO {
        return Err(MathError::InvalidInput(format!(
            "price must be positive, got {current_price}"
        )));
    }
    if lower_bps == 0 || upper_bps == 0 || lower_bps >= 10_000 {
        return Err(MathError::InvalidInput(format!(
            "range offsets out of bounds: lower {lower_bps} bps, upper {upper_bps} bps"
        )));
    }
    let lower_mult = Decimal::ONE - Decimal::from(lower_bps) / BPS_DENOMINATOR;
    let upper_mult = Decimal::ONE + Decimal::from(upper_bps) / BPS_DENOMINATOR;
    Ok(PriceRange::new(
        current_price * lower_mult,
        current_price * upper_mult,
    ))
}

/// Percentage of range width from `price` to each edge. Values go
/// negative once the price leaves the range on that side.
pub fn range_distances(price: Decimal, range: &PriceRange) -> Result<RangeDistances, MathError> {
    if range.is_degenerate() {
        return Err(MathError::DegenerateRange {
            lower: range.lower.to_string(),
            upper: range.upper.to_string(),
        });
    }
    let width = range.width();
    Ok(RangeDistances {
        to_lower_pct: (price - range.lower) / width * HUNDRED,
        to_upper_pct: (range.upper - price) / width * HUNDRED,
    })
}

/// Inclusive on both bounds.
pub fn is_in_range(price: Decimal, range: &PriceRange) -> bool {
    range.contains(price)
}

/// True when the price sits within `(1 - threshold)` of either edge,
/// i.e. it has consumed at least `threshold` of the distance from the
/// opposite edge. `threshold` is a fraction (0.80 for 80%).
///
/// A zero-width or inverted range always triggers so the caller replaces
/// it with a well-formed one.
pub fn should_trigger_rebalance(price: Decimal, range: &PriceRange, threshold: Decimal) -> bool {
    if range.is_degenerate() {
        return true;
    }
    let width = range.width();
    let margin = Decimal::ONE - threshold;
    let to_lower = (price - range.lower) / width;
    let to_upper = (range.upper - price) / width;
    to_lower < margin || to_upper < margin
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::prelude::FromPrimitive;
    use rust_decimal_macros::dec;

    #[test]
    fn test_compute_range_from_bps() {
        let range = compute_range(dec!(2.00), 150, 250).unwrap();
        assert_eq!(range.lower, dec!(1.97));
        assert_eq!(range.upper, dec!(2.05));
    }

    #[test]
    fn test_compute_range_rejects_bad_input() {
        assert!(compute_range(Decimal::ZERO, 150, 250).is_err());
        assert!(compute_range(dec!(1), 0, 250).is_err());
        assert!(compute_range(dec!(1), 10_000, 250).is_err());
    }

    #[test]
    fn test_range_distances() {
        let range = PriceRange::new(dec!(0.85), dec!(1.10));
        let d = range_distances(dec!(1.00), &range).unwrap();
        assert_eq!(d.to_lower_pct, dec!(60));
        assert_eq!(d.to_upper_pct, dec!(40));

        let below = range_distances(dec!(0.80), &range).unwrap();
        assert!(below.to_lower_pct < Decimal::ZERO);

        let flat = PriceRange::new(dec!(1), dec!(1));
        assert!(matches!(
            range_distances(dec!(1), &flat),
            Err(MathError::DegenerateRange { .. })
        ));
    }

    #[test]
    fn test_trigger_near_upper_edge() {
        let range = PriceRange::new(dec!(0.85), dec!(1.10));
        assert!(!should_trigger_rebalance(dec!(1.00), &range, dec!(0.80)));
        assert!(should_trigger_rebalance(dec!(1.085), &range, dec!(0.80)));
        assert!(should_trigger_rebalance(dec!(0.86), &range, dec!(0.80)));
        // Out of range on either side always triggers.
        assert!(should_trigger_rebalance(dec!(1.20), &range, dec!(0.80)));
        assert!(should_trigger_rebalance(dec!(0.50), &range, dec!(0.80)));
    }

    #[test]
    fn test_degenerate_range_always_triggers() {
        let flat = PriceRange::new(dec!(1), dec!(1));
        assert!(should_trigger_rebalance(dec!(1), &flat, dec!(0.80)));
    }

    fn dec_of(v: f64) -> Decimal {
        Decimal::from_f64(v).unwrap().round_dp(8)
    }

    proptest! {
        #[test]
        fn prop_in_range_matches_bounds(
            lower in 0.01f64..100.0,
            width in 0.001f64..100.0,
            price in 0.0f64..250.0,
        ) {
            let range = PriceRange::new(dec_of(lower), dec_of(lower + width));
            let p = dec_of(price);
            prop_assert_eq!(is_in_range(p, &range), range.lower <= p && p <= range.upper);
        }

        #[test]
        fn prop_trigger_matches_min_distance(
            lower in 0.01f64..100.0,
            width in 0.01f64..100.0,
            frac in -0.5f64..1.5,
            threshold in 0.5f64..0.99,
        ) {
            let range = PriceRange::new(dec_of(lower), dec_of(lower + width));
            let price = range.lower + range.width() * dec_of(frac);
            let t = dec_of(threshold);
            let w = range.width();
            let min_dist = ((price - range.lower) / w).min((range.upper - price) / w);
            prop_assert_eq!(
                should_trigger_rebalance(price, &range, t),
                min_dist < Decimal::ONE - t
            );
        }

        #[test]
        fn prop_moving_toward_edge_never_untriggers(
            lower in 0.01f64..100.0,
            width in 0.01f64..100.0,
            frac in 0.0f64..1.0,
            step in 0.0f64..1.0,
            threshold in 0.5f64..0.99,
        ) {
            let range = PriceRange::new(dec_of(lower), dec_of(lower + width));
            let t = dec_of(threshold);
            let w = range.width();
            let start = range.lower + w * dec_of(frac);
            if should_trigger_rebalance(start, &range, t) {
                // Move toward whichever edge is nearer.
                let toward_upper = range.upper - start <= start - range.lower;
                let delta = w * dec_of(step);
                let next = if toward_upper { start + delta } else { start - delta };
                prop_assert!(should_trigger_rebalance(next, &range, t));
            }
        }
    }
}
