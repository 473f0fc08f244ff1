//! Price monitoring.
//!
//! Prices come from an ordered list of [`PriceSource`]s; the monitor
//! attaches range context from the active position, caches the latest
//! snapshot per pool and appends it to the store's history.

mod price_monitor;
mod source;

pub use price_monitor::*;
pub use source::*;
