use crate::error::MathError;
use crate::value_objects::price_range::PriceRange;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

/// Raw (base-unit) token amounts for a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionAmounts {
    pub amount_a: u64,
    pub amount_b: u64,
}

fn sqrt(value: Decimal) -> Result<Decimal, MathError> {
    value
        .sqrt()
        .ok_or_else(|| MathError::InvalidInput(format!("cannot take sqrt of {value}")))
}

fn scale(amount: Decimal, decimals: u8, token: &str) -> Result<u64, MathError> {
    let overflow = || MathError::AmountOverflow {
        token: token.to_string(),
        amount: amount.to_string(),
    };
    let multiplier = Decimal::from(10u64)
        .checked_powu(u64::from(decimals))
        .ok_or_else(overflow)?;
    amount
        .checked_mul(multiplier)
        .ok_or_else(overflow)?
        .floor()
        .to_u64()
        .ok_or_else(overflow)
}

/// Calculates the token amounts needed to deposit `target_usd` of notional
/// into `range` at `current_price`.
///
/// L = usd / (sqrt(P_u) - sqrt(P_l))
/// a = L * (sqrt(P_u) - sqrt(P_c)) / (sqrt(P_c) * sqrt(P_u))
/// b = L * (sqrt(P_c) - sqrt(P_l))
///
/// The current price is clamped into the range so an out-of-range price
/// yields a single-sided deposit instead of negative amounts.
pub fn position_amounts(
    target_usd: Decimal,
    current_price: Decimal,
    range: &PriceRange,
    decimals_a: u8,
    decimals_b: u8,
) -> Result<PositionAmounts, MathError> {
    if target_usd <= Decimal::ZERO || current_price <= Decimal::ZERO || range.lower <= Decimal::ZERO
    {
        return Err(MathError::InvalidInput(format!(
            "size {target_usd}, price {current_price} and range lower {} must be positive",
            range.lower
        )));
    }
    if range.is_degenerate() {
        return Err(MathError::DegenerateRange {
            lower: range.lower.to_string(),
            upper: range.upper.to_string(),
        });
    }

    let sqrt_lower = sqrt(range.lower)?;
    let sqrt_upper = sqrt(range.upper)?;
    let sqrt_current = sqrt(current_price.clamp(range.lower, range.upper))?;

    let den = sqrt_upper - sqrt_lower;
    if den.is_zero() {
        return Err(MathError::InvalidInput("range too small".to_string()));
    }
    let liquidity = target_usd / den;

    let amount_a = liquidity * (sqrt_upper - sqrt_current) / (sqrt_current * sqrt_upper);
    let amount_b = liquidity * (sqrt_current - sqrt_lower);

    Ok(PositionAmounts {
        amount_a: scale(amount_a, decimals_a, "token A")?,
        amount_b: scale(amount_b, decimals_b, "token B")?,
    })
}

/// Value of raw token amounts in token-B (quote) terms.
pub fn position_value(
    amount_a: u64,
    amount_b: u64,
    price: Decimal,
    decimals_a: u8,
    decimals_b: u8,
) -> Decimal {
    let a = Decimal::from(amount_a) / Decimal::from(10u64.pow(u32::from(decimals_a.min(19))));
    let b = Decimal::from(amount_b) / Decimal::from(10u64.pow(u32::from(decimals_b.min(19))));
    a * price + b
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_amounts_in_range_are_two_sided() {
        // Range [1, 4] at price 2.25: sqrt 1, 2, 1.5
        // L = 1000 / (2 - 1) = 1000
        // a = 1000 * 0.5 / 3 = 166.666..., b = 1000 * 0.5 = 500
        let range = PriceRange::new(dec!(1), dec!(4));
        let amounts = position_amounts(dec!(1000), dec!(2.25), &range, 6, 6).unwrap();
        assert!(amounts.amount_a.abs_diff(166_666_666) <= 1);
        assert!(amounts.amount_b.abs_diff(500_000_000) <= 1);
    }

    #[test]
    fn test_price_above_range_is_single_sided() {
        let range = PriceRange::new(dec!(1), dec!(4));
        let amounts = position_amounts(dec!(1000), dec!(9), &range, 6, 6).unwrap();
        assert_eq!(amounts.amount_a, 0);
        assert!(amounts.amount_b.abs_diff(1_000_000_000) <= 1);
    }

    #[test]
    fn test_overflow_is_rejected() {
        let range = PriceRange::new(dec!(0.000001), dec!(0.000002));
        let err = position_amounts(dec!(1000000000), dec!(0.0000015), &range, 18, 18).unwrap_err();
        assert!(matches!(err, MathError::AmountOverflow { .. }));
    }

    #[test]
    fn test_invalid_inputs() {
        let range = PriceRange::new(dec!(1), dec!(1));
        assert!(matches!(
            position_amounts(dec!(1000), dec!(1), &range, 6, 6),
            Err(MathError::DegenerateRange { .. })
        ));
        let range = PriceRange::new(dec!(1), dec!(2));
        assert!(position_amounts(Decimal::ZERO, dec!(1.5), &range, 6, 6).is_err());
    }

    #[test]
    fn test_position_value_in_quote_terms() {
        let value = position_value(2_000_000_000, 3_000_000, dec!(1.5), 9, 6);
        assert_eq!(value, dec!(6));
    }
}
