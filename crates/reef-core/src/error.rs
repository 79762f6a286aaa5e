//! Error types for reef-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid number: {0}")]
    InvalidNumber(String),

    #[error("Invalid precision {0}: must be at most 28")]
    InvalidPrecision(u32),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Ratio {numerator}/{denominator} does not fit in a 32-bit signed range")]
    RatioOverflow { numerator: i128, denominator: i128 },

    #[error("Order constraints override is incomplete: {0}")]
    IncompleteOverride(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid asset: {0}")]
    InvalidAsset(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
