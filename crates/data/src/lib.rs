//! Durable state for the rebalancer.
//!
//! [`store::PositionStore`] is the contract the engine depends on;
//! [`repositories::Database`] implements it on SQLite with one repository
//! per table group.

/// Store error type.
pub mod error;
/// SQLite repositories and the database wrapper.
pub mod repositories;
/// The store contract.
pub mod store;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::StoreError;
    pub use crate::repositories::Database;
    pub use crate::store::PositionStore;
}
