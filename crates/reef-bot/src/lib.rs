//! reef market-making trader.
//!
//! - `config`: TOML configuration with defaults and validation
//! - `timing`: tick pacing with random jitter
//! - `trader`: the update cycle and delete-on-failure handling
//! - `app`: wiring on a paper ledger and the main loop

pub mod app;
pub mod config;
pub mod error;
pub mod timing;
pub mod trader;

pub use app::{build_filters, build_strategy, Application};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use timing::IntervalTimeController;
pub use trader::{CycleOutcome, Trader};
