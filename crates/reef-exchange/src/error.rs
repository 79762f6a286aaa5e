//! Exchange error types.

use reef_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("Exchange API error: {0}")]
    Api(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("No open order tracked for offer id {0}")]
    UnknownOffer(u64),

    #[error("Offer assets do not belong to pair {0}")]
    AssetMismatch(String),

    #[error("Fill handler failed: {0}")]
    Handler(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
