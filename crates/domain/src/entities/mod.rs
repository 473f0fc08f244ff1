pub mod position;
pub mod rebalance;
pub mod skim;
pub mod snapshot;

// Re-export for easier access
pub use position::{NewPosition, Position};
pub use rebalance::{FeesCollected, NewRebalance, Rebalance};
pub use skim::{SkimEntry, SkimWalletStatus};
pub use snapshot::PriceSnapshot;
