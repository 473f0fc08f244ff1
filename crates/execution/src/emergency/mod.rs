//! Pool safety state: pauses and consecutive-failure tracking.

mod pool_state;

pub use pool_state::*;
