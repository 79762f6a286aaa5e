//! Contracts between the engine and the venues it trades on.
//!
//! All async methods return boxed futures so the traits stay usable as
//! `Arc<dyn ...>` objects.

use std::collections::HashMap;
use std::pin::Pin;

use chrono::NaiveDate;
use reef_core::{Asset, Number, OpenOrder, Order, OrderBook, OrderConstraints, Trade, TradingPair};

use crate::error::ExchangeResult;

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One page of trade history.
#[derive(Debug, Clone, Default)]
pub struct TradeHistory {
    /// Trades in the order they happened.
    pub trades: Vec<Trade>,
    /// Cursor of the last trade returned, to resume from.
    pub cursor: Option<String>,
}

/// Source of our own fills.
pub trait TradeFetcher: Send + Sync {
    /// Trades after `cursor_start` and up to `cursor_end` (both exclusive/inclusive
    /// as the venue defines them; `None` means unbounded).
    fn trade_history<'a>(
        &'a self,
        pair: &'a TradingPair,
        cursor_start: Option<String>,
        cursor_end: Option<String>,
    ) -> BoxFuture<'a, ExchangeResult<TradeHistory>>;

    /// Cursor of the most recent trade, `None` if the account never traded.
    fn latest_trade_cursor(&self) -> BoxFuture<'_, ExchangeResult<Option<String>>>;
}

/// Centralized venue taking explicit add/cancel instructions.
pub trait Exchange: TradeFetcher {
    fn order_book<'a>(
        &'a self,
        pair: &'a TradingPair,
        depth: usize,
    ) -> BoxFuture<'a, ExchangeResult<OrderBook>>;

    fn open_orders<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, ExchangeResult<Vec<OpenOrder>>>;

    /// Place a limit order, returning the venue's order id.
    fn add_order<'a>(&'a self, order: &'a Order) -> BoxFuture<'a, ExchangeResult<String>>;

    fn cancel_order<'a>(&'a self, order: &'a OpenOrder) -> BoxFuture<'a, ExchangeResult<()>>;

    fn account_balances<'a>(
        &'a self,
        assets: &'a [Asset],
    ) -> BoxFuture<'a, ExchangeResult<HashMap<Asset, Number>>>;

    fn order_constraints(&self, pair: &TradingPair) -> OrderConstraints;
}

/// Receives every fill the tracker observes.
///
/// Calls may arrive concurrently and out of order.
pub trait FillHandler: Send + Sync {
    fn handle_fill<'a>(&'a self, trade: &'a Trade) -> BoxFuture<'a, ExchangeResult<()>>;
}

/// Order book of a pair, used by filters that look at the opposing side.
pub trait OrderBookSource: Send + Sync {
    fn order_book<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, ExchangeResult<OrderBook>>;
}

/// Volume already traded on a trading day, in base and quote units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DailyVolume {
    pub sold_base: Number,
    pub sold_quote: Number,
    pub bought_base: Number,
    pub bought_quote: Number,
}

/// Provides the volume booked so far on a given day.
pub trait DailyVolumeSource: Send + Sync {
    fn daily_volume(&self, day: NaiveDate) -> DailyVolume;
}
