use crate::error::MathError;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;

const TICK_BASE: f64 = 1.0001;

/// Returns the price corresponding to a given tick.
/// P = 1.0001 ^ tick
pub fn tick_to_price(tick: i32) -> Result<Decimal, MathError> {
    let price_f64 = TICK_BASE.powi(tick);
    Decimal::from_f64(price_f64)
        .ok_or_else(|| MathError::InvalidInput(format!("tick {tick} out of representable range")))
}

/// Returns the tick for a given price, snapped down to a multiple of
/// `tick_spacing`.
/// tick = floor(log_1.0001(P) / spacing) * spacing
pub fn price_to_tick(price: Decimal, tick_spacing: i32) -> Result<i32, MathError> {
    if price <= Decimal::ZERO {
        return Err(MathError::InvalidInput(format!(
            "price must be positive, got {price}"
        )));
    }
    if tick_spacing <= 0 {
        return Err(MathError::InvalidInput(format!(
            "tick spacing must be positive, got {tick_spacing}"
        )));
    }
    let price_f64 = price
        .to_f64()
        .ok_or_else(|| MathError::InvalidInput(format!("price {price} not convertible")))?;
    let raw_tick = price_f64.ln() / TICK_BASE.ln();
    let spacing = f64::from(tick_spacing);
    let snapped = (raw_tick / spacing).floor() * spacing;
    if !snapped.is_finite() || snapped < f64::from(i32::MIN) || snapped > f64::from(i32::MAX) {
        return Err(MathError::InvalidInput(format!(
            "price {price} maps outside the tick domain"
        )));
    }
    Ok(snapped as i32)
}
