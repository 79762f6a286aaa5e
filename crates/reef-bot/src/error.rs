//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] reef_core::CoreError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] reef_exchange::ExchangeError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] reef_ledger::LedgerError),

    #[error("Key error: {0}")]
    Key(#[from] reef_ledger::KeyError),

    #[error("Strategy error: {0}")]
    Strategy(#[from] reef_strategy::StrategyError),

    #[error("Filter error: {0}")]
    Filter(#[from] reef_filter::FilterError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] reef_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
