//! Offer reconciliation strategies.
//!
//! A [`SideStrategy`] turns target levels into offer operations for one side
//! of the book; [`ComposeStrategy`] runs a buy and a sell side together.

pub mod compose;
pub mod error;
pub mod provider;
pub mod side;

pub use compose::{ComposeStrategy, Strategy};
pub use error::{StrategyError, StrategyResult};
pub use provider::{FixedLevelProvider, LevelProvider};
pub use side::{validate_levels, DeleteSideStrategy, SellSideStrategy, SideStrategy};
