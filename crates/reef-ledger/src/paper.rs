//! In-memory ledger for paper trading and tests.
//!
//! Holds accounts, balances, offers and sequence numbers, and applies offer
//! transactions atomically the way the real ledger does: the sequence number
//! must be exactly one past the account's current one, every operation must
//! succeed, and the fee is charged in the native asset. Fills are simulated
//! explicitly with `fill_offer`.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reef_core::{Asset, Number, Offer, Order, OrderBook, OrderSide, Trade, TradingPair, LEDGER_PRECISION};
use reef_exchange::{BoxFuture, ExchangeError, ExchangeResult, TradeFetcher, TradeHistory};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::client::{AccountSnapshot, BalanceLine, LedgerClient, SignedTransaction};
use crate::error::{LedgerError, LedgerResult, SubmitError};

#[derive(Debug, Clone, Default)]
struct PaperAccount {
    balances: Vec<BalanceLine>,
    sequence: i64,
}

impl PaperAccount {
    fn line_mut(&mut self, asset: &Asset) -> Option<&mut BalanceLine> {
        self.balances.iter_mut().find(|b| &b.asset == asset)
    }
}

#[derive(Debug, Clone)]
struct Fill {
    cursor: u64,
    offer: Offer,
    amount: Decimal,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PaperState {
    accounts: HashMap<String, PaperAccount>,
    offers: Vec<Offer>,
    next_offer_id: u64,
    fills: Vec<Fill>,
    forced_failures: VecDeque<SubmitError>,
    submissions: Vec<SignedTransaction>,
}

#[derive(Debug)]
pub struct PaperLedger {
    state: Mutex<PaperState>,
}

impl Default for PaperLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl PaperLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PaperState {
                next_offer_id: 1,
                ..Default::default()
            }),
        }
    }

    pub fn create_account(&self, account: &str, sequence: i64) {
        self.state.lock().accounts.insert(
            account.to_string(),
            PaperAccount {
                balances: vec![BalanceLine {
                    asset: Asset::Native,
                    balance: Decimal::ZERO,
                    limit: None,
                }],
                sequence,
            },
        );
    }

    /// Set a balance, opening the trust line if needed.
    pub fn set_balance(
        &self,
        account: &str,
        asset: &Asset,
        balance: Decimal,
        limit: Option<Decimal>,
    ) -> LedgerResult<()> {
        let mut state = self.state.lock();
        let acct = state
            .accounts
            .get_mut(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;
        match acct.line_mut(asset) {
            Some(line) => {
                line.balance = balance;
                if !asset.is_native() {
                    line.limit = limit;
                }
            }
            None => acct.balances.push(BalanceLine {
                asset: asset.clone(),
                balance,
                limit: if asset.is_native() { None } else { limit },
            }),
        }
        Ok(())
    }

    pub fn balance(&self, account: &str, asset: &Asset) -> Option<Decimal> {
        let state = self.state.lock();
        state
            .accounts
            .get(account)?
            .balances
            .iter()
            .find(|b| &b.asset == asset)
            .map(|b| b.balance)
    }

    pub fn set_sequence(&self, account: &str, sequence: i64) {
        if let Some(acct) = self.state.lock().accounts.get_mut(account) {
            acct.sequence = sequence;
        }
    }

    /// Rest an offer directly. An id of 0 is replaced by the next free id.
    pub fn place_offer(&self, mut offer: Offer) -> u64 {
        let mut state = self.state.lock();
        if offer.id == 0 {
            offer.id = state.next_offer_id;
        }
        state.next_offer_id = state.next_offer_id.max(offer.id + 1);
        let id = offer.id;
        state.offers.push(offer);
        id
    }

    pub fn offers_of(&self, account: &str) -> Vec<Offer> {
        let state = self.state.lock();
        let mut offers: Vec<Offer> = state
            .offers
            .iter()
            .filter(|o| o.seller == account)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.id);
        offers
    }

    /// Make the next submissions fail with `error`, in order.
    pub fn inject_failure(&self, error: SubmitError) {
        self.state.lock().forced_failures.push_back(error);
    }

    /// Every transaction received, accepted or not.
    pub fn submissions(&self) -> Vec<SignedTransaction> {
        self.state.lock().submissions.clone()
    }

    /// Take `amount` (in selling units) out of a resting offer as if a
    /// counterparty had crossed it.
    pub fn fill_offer(&self, offer_id: u64, amount: Decimal) -> LedgerResult<()> {
        let mut state = self.state.lock();
        let index = state
            .offers
            .iter()
            .position(|o| o.id == offer_id)
            .ok_or_else(|| SubmitError::Rejected(format!("offer {offer_id} not found")))?;

        let offer = state.offers[index].clone();
        let filled = amount.min(offer.amount.value());
        let received = filled * offer.price.value();

        if let Some(acct) = state.accounts.get_mut(&offer.seller) {
            if let Some(line) = acct.line_mut(&offer.selling) {
                line.balance -= filled;
            }
            if let Some(line) = acct.line_mut(&offer.buying) {
                line.balance += received;
            }
        }

        let remaining = offer.amount.value() - filled;
        if remaining.is_zero() {
            state.offers.remove(index);
        } else {
            state.offers[index].amount =
                Number::from_decimal(remaining, offer.amount.precision().max(LEDGER_PRECISION))?;
        }

        let cursor = state.fills.len() as u64 + 1;
        state.fills.push(Fill {
            cursor,
            offer,
            amount: filled,
            timestamp: Utc::now(),
        });
        info!(offer_id, filled = %filled, cursor, "Paper fill");
        Ok(())
    }

    fn snapshot(state: &PaperState, account: &str) -> LedgerResult<AccountSnapshot> {
        let acct = state
            .accounts
            .get(account)
            .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))?;
        let mut offers: Vec<Offer> = state
            .offers
            .iter()
            .filter(|o| o.seller == account)
            .cloned()
            .collect();
        offers.sort_by_key(|o| o.id);
        let trust_lines = acct.balances.iter().filter(|b| !b.asset.is_native()).count();
        Ok(AccountSnapshot {
            account_id: account.to_string(),
            balances: acct.balances.clone(),
            subentry_count: (offers.len() + trust_lines) as u32,
            offers,
        })
    }

    fn apply(state: &mut PaperState, signed: &SignedTransaction) -> Result<String, SubmitError> {
        if let Some(forced) = state.forced_failures.pop_front() {
            return Err(forced);
        }
        let tx = &signed.transaction;
        let source = state
            .accounts
            .get(&tx.source_account)
            .ok_or_else(|| SubmitError::Rejected(format!("unknown account {}", tx.source_account)))?;
        if tx.sequence != source.sequence + 1 {
            debug!(expected = source.sequence + 1, got = tx.sequence, "Bad sequence");
            return Err(SubmitError::BadSequence);
        }

        let mut offers = state.offers.clone();
        let mut next_id = state.next_offer_id;
        for op in &tx.operations {
            let owner = op.source_account.as_deref().unwrap_or(&tx.source_account);
            let acct = state
                .accounts
                .get(owner)
                .ok_or_else(|| SubmitError::Rejected(format!("unknown account {owner}")))?;
            for asset in [&op.selling, &op.buying] {
                if !acct.balances.iter().any(|b| &b.asset == asset) {
                    return Err(SubmitError::Rejected(format!("{owner} has no trust line for {asset}")));
                }
            }

            if op.is_create() {
                if op.amount.is_zero() {
                    return Err(SubmitError::Rejected("create with zero amount".to_string()));
                }
                offers.push(Offer {
                    id: next_id,
                    seller: owner.to_string(),
                    selling: op.selling.clone(),
                    buying: op.buying.clone(),
                    price: op.price,
                    amount: op.amount,
                });
                next_id += 1;
                continue;
            }

            let index = offers
                .iter()
                .position(|o| o.id == op.offer_id && o.seller == owner)
                .ok_or_else(|| SubmitError::Rejected(format!("offer {} not found", op.offer_id)))?;
            if op.is_delete() {
                offers.remove(index);
            } else {
                let offer = &mut offers[index];
                offer.selling = op.selling.clone();
                offer.buying = op.buying.clone();
                offer.price = op.price;
                offer.amount = op.amount;
            }
        }

        state.offers = offers;
        state.next_offer_id = next_id;
        if let Some(acct) = state.accounts.get_mut(&tx.source_account) {
            acct.sequence = tx.sequence;
            if let Some(native) = acct.line_mut(&Asset::Native) {
                native.balance -= tx.fee.value();
            }
        }
        Ok(signed.hash.clone())
    }

    fn trade_from_fill(fill: &Fill, pair: &TradingPair) -> ExchangeResult<Option<Trade>> {
        let offer = &fill.offer;
        let amount = Number::from_decimal(fill.amount, LEDGER_PRECISION)?;
        let (side, price, volume, cost) = if offer.selling == pair.base && offer.buying == pair.quote {
            (OrderSide::Sell, offer.price, amount, amount.multiply(&offer.price))
        } else if offer.selling == pair.quote && offer.buying == pair.base {
            (
                OrderSide::Buy,
                offer.price.invert_to(LEDGER_PRECISION)?,
                amount.multiply(&offer.price),
                amount,
            )
        } else {
            return Ok(None);
        };
        Ok(Some(Trade {
            order: Order {
                pair: pair.clone(),
                side,
                price,
                volume,
                timestamp: Some(fill.timestamp),
            },
            transaction_id: format!("paper-fill-{}", fill.cursor),
            cursor: fill.cursor.to_string(),
            cost,
            fee: Number::zero(),
        }))
    }
}

fn aggregate(mut levels: Vec<(Number, Number)>, ascending: bool) -> Vec<(Number, Number)> {
    levels.sort_by(|a, b| {
        let ord = a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    let mut out: Vec<(Number, Number)> = Vec::with_capacity(levels.len());
    for (price, volume) in levels {
        match out.last_mut() {
            Some(last) if last.0 == price => last.1 = last.1.add(&volume),
            _ => out.push((price, volume)),
        }
    }
    out
}

impl LedgerClient for PaperLedger {
    fn load_account<'a>(&'a self, account: &'a str) -> BoxFuture<'a, LedgerResult<AccountSnapshot>> {
        Box::pin(async move { Self::snapshot(&self.state.lock(), account) })
    }

    fn sequence_for_account<'a>(&'a self, account: &'a str) -> BoxFuture<'a, LedgerResult<i64>> {
        Box::pin(async move {
            self.state
                .lock()
                .accounts
                .get(account)
                .map(|a| a.sequence)
                .ok_or_else(|| LedgerError::AccountNotFound(account.to_string()))
        })
    }

    fn order_book<'a>(&'a self, pair: &'a TradingPair) -> BoxFuture<'a, LedgerResult<OrderBook>> {
        Box::pin(async move {
            let state = self.state.lock();
            let mut asks = Vec::new();
            let mut bids = Vec::new();
            for offer in &state.offers {
                if offer.selling == pair.base && offer.buying == pair.quote {
                    asks.push((offer.price, offer.amount));
                } else if offer.selling == pair.quote && offer.buying == pair.base {
                    bids.push((
                        offer.price.invert_to(LEDGER_PRECISION)?,
                        offer.amount.multiply(&offer.price),
                    ));
                }
            }
            let to_orders = |levels: Vec<(Number, Number)>, side: OrderSide| -> Vec<Order> {
                levels
                    .into_iter()
                    .map(|(price, volume)| Order {
                        pair: pair.clone(),
                        side,
                        price,
                        volume,
                        timestamp: None,
                    })
                    .collect()
            };
            Ok(OrderBook {
                asks: to_orders(aggregate(asks, true), OrderSide::Sell),
                bids: to_orders(aggregate(bids, false), OrderSide::Buy),
            })
        })
    }

    fn submit_transaction<'a>(
        &'a self,
        tx: &'a SignedTransaction,
    ) -> BoxFuture<'a, Result<String, SubmitError>> {
        Box::pin(async move {
            let mut state = self.state.lock();
            state.submissions.push(tx.clone());
            let result = Self::apply(&mut state, tx);
            match &result {
                Ok(hash) => info!(
                    sequence = tx.transaction.sequence,
                    ops = tx.transaction.operations.len(),
                    hash = %hash,
                    "Paper transaction applied"
                ),
                Err(e) => info!(sequence = tx.transaction.sequence, error = %e, "Paper transaction rejected"),
            }
            result
        })
    }
}

impl TradeFetcher for PaperLedger {
    fn trade_history<'a>(
        &'a self,
        pair: &'a TradingPair,
        cursor_start: Option<String>,
        cursor_end: Option<String>,
    ) -> BoxFuture<'a, ExchangeResult<TradeHistory>> {
        Box::pin(async move {
            let parse = |c: Option<String>| -> ExchangeResult<Option<u64>> {
                c.map(|s| {
                    s.parse::<u64>()
                        .map_err(|_| ExchangeError::Api(format!("invalid cursor {s}")))
                })
                .transpose()
            };
            let start = parse(cursor_start)?.unwrap_or(0);
            let end = parse(cursor_end)?.unwrap_or(u64::MAX);

            let fills: Vec<Fill> = self
                .state
                .lock()
                .fills
                .iter()
                .filter(|f| f.cursor > start && f.cursor <= end)
                .cloned()
                .collect();

            let mut trades = Vec::new();
            for fill in &fills {
                if let Some(trade) = Self::trade_from_fill(fill, pair)? {
                    trades.push(trade);
                }
            }
            Ok(TradeHistory {
                trades,
                cursor: fills.last().map(|f| f.cursor.to_string()),
            })
        })
    }

    fn latest_trade_cursor(&self) -> BoxFuture<'_, ExchangeResult<Option<String>>> {
        Box::pin(async move { Ok(self.state.lock().fills.last().map(|f| f.cursor.to_string())) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Transaction;
    use reef_core::ManageOffer;
    use rust_decimal_macros::dec;

    fn usd() -> Asset {
        Asset::credit("USD", "GISSUER")
    }

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, usd())
    }

    fn num(s: &str) -> Number {
        s.parse().unwrap()
    }

    fn ledger() -> PaperLedger {
        let l = PaperLedger::new();
        l.create_account("GME", 10);
        l.set_balance("GME", &Asset::Native, dec!(100), None).unwrap();
        l.set_balance("GME", &usd(), dec!(50), Some(dec!(1000))).unwrap();
        l
    }

    fn signed(sequence: i64, operations: Vec<ManageOffer>) -> SignedTransaction {
        SignedTransaction {
            transaction: Transaction {
                source_account: "GME".to_string(),
                sequence,
                fee: num("0.00001"),
                operations,
            },
            hash: format!("hash-{sequence}"),
            signatures: vec![],
        }
    }

    fn create(price: &str, amount: &str) -> ManageOffer {
        ManageOffer {
            offer_id: 0,
            selling: Asset::Native,
            buying: usd(),
            price: num(price),
            amount: num(amount),
            source_account: None,
        }
    }

    #[tokio::test]
    async fn test_applies_transaction_and_bumps_sequence() {
        let l = ledger();
        let hash = l
            .submit_transaction(&signed(11, vec![create("0.2", "10"), create("0.3", "5")]))
            .await
            .unwrap();
        assert_eq!(hash, "hash-11");
        assert_eq!(l.sequence_for_account("GME").await.unwrap(), 11);
        assert_eq!(l.balance("GME", &Asset::Native), Some(dec!(99.99999)));

        let snap = l.load_account("GME").await.unwrap();
        assert_eq!(snap.offers.len(), 2);
        assert_eq!(snap.subentry_count, 3);
    }

    #[tokio::test]
    async fn test_rejects_bad_sequence() {
        let l = ledger();
        assert_eq!(
            l.submit_transaction(&signed(13, vec![create("0.2", "10")])).await,
            Err(SubmitError::BadSequence)
        );
        assert!(l.offers_of("GME").is_empty());
        assert_eq!(l.submissions().len(), 1);
    }

    #[tokio::test]
    async fn test_transaction_is_atomic() {
        let l = ledger();
        let missing = ManageOffer {
            offer_id: 77,
            ..create("0.2", "0")
        };
        let result = l
            .submit_transaction(&signed(11, vec![create("0.2", "10"), missing]))
            .await;
        assert!(matches!(result, Err(SubmitError::Rejected(_))));
        assert!(l.offers_of("GME").is_empty());
        assert_eq!(l.sequence_for_account("GME").await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_modify_and_delete() {
        let l = ledger();
        let id = l.place_offer(Offer {
            id: 5,
            seller: "GME".to_string(),
            selling: Asset::Native,
            buying: usd(),
            price: num("1"),
            amount: num("10"),
        });
        assert_eq!(id, 5);

        let modify = ManageOffer {
            offer_id: 5,
            ..create("1.1", "4")
        };
        l.submit_transaction(&signed(11, vec![modify])).await.unwrap();
        assert_eq!(l.offers_of("GME")[0].amount, num("4"));

        let delete = ManageOffer {
            offer_id: 5,
            ..create("1.1", "0")
        };
        l.submit_transaction(&signed(12, vec![delete, create("2", "1")]))
            .await
            .unwrap();
        let offers = l.offers_of("GME");
        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].id, 6);
    }

    #[tokio::test]
    async fn test_injected_failure_comes_first() {
        let l = ledger();
        l.inject_failure(SubmitError::RateLimited);
        let tx = signed(11, vec![create("0.2", "1")]);
        assert_eq!(l.submit_transaction(&tx).await, Err(SubmitError::RateLimited));
        assert!(l.submit_transaction(&tx).await.is_ok());
    }

    #[tokio::test]
    async fn test_fills_become_trades() {
        let l = ledger();
        let sell = l.place_offer(Offer {
            id: 0,
            seller: "GME".to_string(),
            selling: Asset::Native,
            buying: usd(),
            price: num("0.5"),
            amount: num("10"),
        });
        let buy = l.place_offer(Offer {
            id: 0,
            seller: "GME".to_string(),
            selling: usd(),
            buying: Asset::Native,
            price: num("2.5"),
            amount: num("4"),
        });

        assert_eq!(l.latest_trade_cursor().await.unwrap(), None);
        l.fill_offer(sell, dec!(4)).unwrap();
        l.fill_offer(buy, dec!(4)).unwrap();

        assert_eq!(l.balance("GME", &Asset::Native), Some(dec!(106)));
        assert_eq!(l.balance("GME", &usd()), Some(dec!(48)));
        assert_eq!(l.offers_of("GME").len(), 1);

        let history = l.trade_history(&pair(), None, None).await.unwrap();
        assert_eq!(history.trades.len(), 2);
        assert_eq!(history.cursor.as_deref(), Some("2"));

        let sold = &history.trades[0];
        assert_eq!(sold.order.side, OrderSide::Sell);
        assert_eq!(sold.order.volume, num("4"));
        assert_eq!(sold.cost, num("2"));

        let bought = &history.trades[1];
        assert_eq!(bought.order.side, OrderSide::Buy);
        assert_eq!(bought.order.price, num("0.4"));
        assert_eq!(bought.order.volume, num("10"));
        assert_eq!(bought.cost, num("4"));

        let later = l.trade_history(&pair(), Some("1".to_string()), None).await.unwrap();
        assert_eq!(later.trades.len(), 1);
    }

    #[tokio::test]
    async fn test_order_book_aggregates_levels() {
        let l = ledger();
        for (price, amount) in [("0.5", "1"), ("0.5", "2"), ("0.6", "1")] {
            l.place_offer(Offer {
                id: 0,
                seller: "GOTHER".to_string(),
                selling: Asset::Native,
                buying: usd(),
                price: num(price),
                amount: num(amount),
            });
        }
        l.place_offer(Offer {
            id: 0,
            seller: "GOTHER".to_string(),
            selling: usd(),
            buying: Asset::Native,
            price: num("2.5"),
            amount: num("1"),
        });

        let book = l.order_book(&pair()).await.unwrap();
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.best_ask().unwrap().price, num("0.5"));
        assert_eq!(book.best_ask().unwrap().volume, num("3"));
        assert_eq!(book.best_bid().unwrap().price, num("0.4"));
        assert_eq!(book.best_bid().unwrap().volume, num("2.5"));
    }
}
