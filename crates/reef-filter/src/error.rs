//! Filter error types.

use reef_core::CoreError;
use reef_exchange::ExchangeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Invalid filter configuration: {0}")]
    InvalidConfig(String),

    #[error("Filter {filter} failed: {reason}")]
    Failed { filter: &'static str, reason: String },

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type FilterResult<T> = Result<T, FilterError>;
