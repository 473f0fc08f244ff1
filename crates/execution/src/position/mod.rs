//! Position lifecycle on chain: open, close and close-then-reopen.

mod guard;
mod manager;

pub use guard::*;
pub use manager::*;
