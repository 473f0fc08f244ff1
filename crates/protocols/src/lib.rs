//! External boundaries of the rebalancer.
//!
//! The engine talks to the outside world only through the traits in
//! [`client`]: an AMM client that reads pools and builds transactions, a
//! chain client that simulates, submits and reads balances, and an
//! oracle for reference prices. [`bridge`] and [`pyth`] provide HTTP
//! implementations; [`parsers`] extracts what the engine needs from
//! settled transaction effects.

pub mod bridge;
pub mod client;
pub mod parsers;
pub mod pyth;
pub mod rpc;
pub mod tx;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bridge::BridgeClient;
    pub use crate::client::{AmmClient, ChainClient, ChainError, OracleClient, PriceSourceError};
    pub use crate::parsers::{parse_fees, parse_gas_used, parse_liquidity, parse_position_id};
    pub use crate::pyth::HermesClient;
    pub use crate::rpc::{Retryable, RetryPolicy};
    pub use crate::tx::{
        ClosePositionParams, CoinObject, CollectFeesParams, CreatedObject, GasSummary,
        OpenPositionParams, PoolState, SubmitResult, SwapParams, Transaction, TxCommand, TxEffects,
        TxEvent,
    };
}
