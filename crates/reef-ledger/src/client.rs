//! Ledger client contract and the data it exchanges.

use std::sync::Arc;

use reef_core::{Asset, ManageOffer, Number, Offer, OrderBook, TradingPair};
use reef_exchange::{BoxFuture, ExchangeError, ExchangeResult, OrderBookSource};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerResult, SubmitError};

/// One balance line of an account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceLine {
    pub asset: Asset,
    pub balance: Decimal,
    /// Trust line limit. `None` for the native asset, which has no limit.
    pub limit: Option<Decimal>,
}

/// Authoritative account state as loaded at the start of a cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub balances: Vec<BalanceLine>,
    pub subentry_count: u32,
    pub offers: Vec<Offer>,
}

impl AccountSnapshot {
    pub fn balance_line(&self, asset: &Asset) -> Option<&BalanceLine> {
        self.balances.iter().find(|b| &b.asset == asset)
    }

    /// Offers selling `selling` for `buying`, cheapest first.
    pub fn offers_for(&self, selling: &Asset, buying: &Asset) -> Vec<Offer> {
        let mut offers: Vec<Offer> = self
            .offers
            .iter()
            .filter(|o| &o.selling == selling && &o.buying == buying)
            .cloned()
            .collect();
        offers.sort_by(|a, b| {
            a.price
                .partial_cmp(&b.price)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        offers
    }
}

/// Unsigned ledger transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub source_account: String,
    pub sequence: i64,
    /// Total fee in native units.
    pub fee: Number,
    pub operations: Vec<ManageOffer>,
}

/// Transaction with its hash and signatures, hex encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub hash: String,
    pub signatures: Vec<String>,
}

/// Ledger venue access.
pub trait LedgerClient: Send + Sync {
    fn load_account<'a>(&'a self, account: &'a str) -> BoxFuture<'a, LedgerResult<AccountSnapshot>>;

    /// Current sequence number of `account`.
    fn sequence_for_account<'a>(&'a self, account: &'a str) -> BoxFuture<'a, LedgerResult<i64>>;

    /// Aggregated order book of `pair`, including our own offers.
    fn order_book<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, LedgerResult<OrderBook>>;

    /// Submit a signed transaction, returning its hash once the ledger accepts it.
    fn submit_transaction<'a>(
        &'a self,
        tx: &'a SignedTransaction,
    ) -> BoxFuture<'a, Result<String, SubmitError>>;
}

/// Exposes a ledger client's order book to the submit filters.
pub struct LedgerBook(pub Arc<dyn LedgerClient>);

impl OrderBookSource for LedgerBook {
    fn order_book<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, ExchangeResult<OrderBook>> {
        Box::pin(async move {
            self.0
                .order_book(pair)
                .await
                .map_err(|e| ExchangeError::Api(e.to_string()))
        })
    }
}
