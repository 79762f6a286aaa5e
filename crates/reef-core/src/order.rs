//! Exchange order types.
//!
//! Used by venues that take explicit add/cancel instructions rather than
//! ledger offer operations. Prices are quote units per base unit and volumes
//! are base units.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::TradingPair;
use crate::number::Number;

/// Order side: buy or sell the base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Limit order on a trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub pair: TradingPair,
    pub side: OrderSide,
    pub price: Number,
    pub volume: Number,
    pub timestamp: Option<DateTime<Utc>>,
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Order[{} {} {} @ {}]",
            self.pair, self.side, self.volume, self.price
        )
    }
}

/// Order accepted by the exchange and possibly partly filled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub order: Order,
    pub id: String,
    pub start_time: Option<DateTime<Utc>>,
    pub volume_executed: Number,
}

/// Instruction for an exchange that takes explicit adds and cancels.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(Order),
    Cancel(OpenOrder),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add(order) => write!(f, "Add({order})"),
            Self::Cancel(open) => write!(f, "Cancel({}, {})", open.id, open.order),
        }
    }
}

/// Fill of one of our orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub order: Order,
    pub transaction_id: String,
    /// Opaque position in the venue's trade history.
    pub cursor: String,
    /// Quote units exchanged.
    pub cost: Number,
    pub fee: Number,
}

/// Aggregated book of one pair, bids descending and asks ascending.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderBook {
    pub bids: Vec<Order>,
    pub asks: Vec<Order>,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<&Order> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Order> {
        self.asks.first()
    }
}
