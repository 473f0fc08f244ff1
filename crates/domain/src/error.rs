use thiserror::Error;

/// Errors raised by the pure math functions.
///
/// These only occur on invalid input and indicate a programming or
/// configuration mistake upstream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("degenerate range: lower {lower} >= upper {upper}")]
    DegenerateRange { lower: String, upper: String },

    #[error("amount {amount} for {token} exceeds u64::MAX")]
    AmountOverflow { token: String, amount: String },
}
