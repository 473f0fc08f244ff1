//! Pure math used by the decision engine and position sizing.

pub mod concentrated_liquidity;
pub mod price_tick;
pub mod range;
pub mod skim;
