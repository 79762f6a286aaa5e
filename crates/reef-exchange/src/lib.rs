//! Exchange-facing contracts and fill plumbing.
//!
//! - `Exchange`, `TradeFetcher`, `FillHandler`: venue contracts
//! - `FillTracker`: polls for fills and dispatches them to handlers
//! - `DailyVolumeTracker`: per-day volume booked from fills
//! - `BatchedExchange`: runs offer operations as add/cancel commands

pub mod api;
pub mod batched;
pub mod error;
pub mod fill_tracker;
pub mod volume;

pub use api::{
    BoxFuture, DailyVolume, DailyVolumeSource, Exchange, FillHandler, OrderBookSource,
    TradeFetcher, TradeHistory,
};
pub use batched::{remaining_volume, BatchedExchange};
pub use error::{ExchangeError, ExchangeResult};
pub use fill_tracker::{FillLogger, FillTracker, FnFillHandler};
pub use volume::DailyVolumeTracker;
