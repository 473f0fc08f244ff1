//! Profit skimming to the skim wallet and deposit alerts.

mod manager;

pub use manager::*;
