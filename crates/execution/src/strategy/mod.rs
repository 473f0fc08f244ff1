//! Rebalance decisions.

mod decision;

pub use decision::*;
