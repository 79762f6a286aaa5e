//! Strategy error types.

use reef_core::CoreError;
use reef_ledger::LedgerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Invalid strategy configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid levels: {0}")]
    InvalidLevels(String),

    #[error("Level provider failed: {0}")]
    Provider(String),

    #[error("Error in buy side strategy: {0}")]
    BuySide(Box<StrategyError>),

    #[error("Error in sell side strategy: {0}")]
    SellSide(Box<StrategyError>),

    #[error("Errors in both buy and sell side strategies: {buy}, {sell}")]
    BothSides {
        buy: Box<StrategyError>,
        sell: Box<StrategyError>,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl StrategyError {
    /// Combine per-side results, naming the side(s) that failed.
    pub fn combine<B, S>(
        buy: Result<B, StrategyError>,
        sell: Result<S, StrategyError>,
    ) -> Result<(B, S), StrategyError> {
        match (buy, sell) {
            (Ok(b), Ok(s)) => Ok((b, s)),
            (Err(b), Err(s)) => Err(Self::BothSides {
                buy: Box::new(b),
                sell: Box::new(s),
            }),
            (Err(b), Ok(_)) => Err(Self::BuySide(Box::new(b))),
            (Ok(_), Err(s)) => Err(Self::SellSide(Box::new(s))),
        }
    }
}

pub type StrategyResult<T> = Result<T, StrategyError>;
