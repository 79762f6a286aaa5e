//! Core domain types for the reef market-making engine.
//!
//! - `Number`: exact decimal held at a fixed precision
//! - `OrderConstraints`: per-market precision and minimum volume rules
//! - `Asset`, `TradingPair`: market identification
//! - `Level`, `Offer`, `ManageOffer`: ledger offers and pending operations
//! - `Order`, `Command`, `Trade`: exchange orders and fills

pub mod asset;
pub mod constraints;
pub mod error;
pub mod number;
pub mod offer;
pub mod order;

pub use asset::{Asset, TradingPair};
pub use constraints::{OrderConstraints, OrderConstraintsOverride, LEDGER_PRECISION};
pub use error::{CoreError, Result};
pub use number::{Number, Rounding, MAX_PRECISION};
pub use offer::{Level, ManageOffer, Offer};
pub use order::{Command, OpenOrder, Order, OrderBook, OrderSide, Trade};
