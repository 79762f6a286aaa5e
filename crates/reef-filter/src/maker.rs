//! Maker-only mode: never place an offer that would take liquidity.
//!
//! Our own resting offers are removed from the book before finding the
//! opposing best price, since they are about to move anyway.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use reef_core::{ManageOffer, Offer, Order, TradingPair, LEDGER_PRECISION};
use reef_exchange::OrderBookSource;
use reef_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::FilterResult;
use crate::ops::{filter_ops, offer_view, op_view, Action, MarketView, Verdict};

pub struct MakerModeFilter {
    pair: TradingPair,
    book: Arc<dyn OrderBookSource>,
    source_account: Option<String>,
}

impl MakerModeFilter {
    pub fn new(pair: TradingPair, book: Arc<dyn OrderBookSource>) -> Self {
        Self {
            pair,
            book,
            source_account: None,
        }
    }

    /// Account set on the deletes this filter adds for untouched offers.
    pub fn with_source_account(mut self, source_account: Option<String>) -> Self {
        self.source_account = source_account;
        self
    }

    pub async fn apply(
        &self,
        ops: Vec<ManageOffer>,
        selling_offers: &[Offer],
        buying_offers: &[Offer],
    ) -> FilterResult<Vec<ManageOffer>> {
        let book = self.book.order_book(&self.pair).await?;
        let own = own_levels(&self.pair, selling_offers.iter().chain(buying_offers))?;
        let top_ask = top_excluding(&book.asks, &own);
        let top_bid = top_excluding(&book.bids, &own);
        debug!(top_bid = ?top_bid, top_ask = ?top_ask, "Maker mode opposing prices");

        let crosses = |view: &MarketView| match view.action {
            Action::Sell => top_bid.is_some_and(|bid| view.price <= bid),
            Action::Buy => top_ask.is_some_and(|ask| view.price >= ask),
        };

        let touched: HashSet<u64> = ops.iter().map(|op| op.offer_id).filter(|id| *id != 0).collect();
        let mut out = filter_ops("maker_mode", ops, |op| {
            Ok(match op_view(&self.pair, op)? {
                Some(view) if crosses(&view) => Verdict::Drop,
                _ => Verdict::Keep,
            })
        })?;

        for offer in selling_offers.iter().chain(buying_offers) {
            if touched.contains(&offer.id) {
                continue;
            }
            if let Some(view) = offer_view(&self.pair, offer)? {
                if crosses(&view) {
                    info!(offer = %offer, "Resting offer would take liquidity, deleting");
                    Metrics::filter_action("maker_mode", "deleted");
                    out.push(ManageOffer::delete(offer, self.source_account.clone()));
                }
            }
        }
        Ok(out)
    }
}

/// Our own base volume per price level (quote per base, as the book shows it).
fn own_levels<'a>(
    pair: &TradingPair,
    offers: impl Iterator<Item = &'a Offer>,
) -> FilterResult<HashMap<Decimal, Decimal>> {
    let mut levels = HashMap::new();
    for offer in offers {
        let (price, volume) = if offer.selling == pair.base && offer.buying == pair.quote {
            (offer.price.value(), offer.amount.value())
        } else if offer.selling == pair.quote && offer.buying == pair.base {
            (
                offer.price.invert_to(LEDGER_PRECISION)?.value(),
                offer.amount.multiply(&offer.price).value(),
            )
        } else {
            continue;
        };
        *levels.entry(price.normalize()).or_insert(Decimal::ZERO) += volume;
    }
    Ok(levels)
}

/// Best price on one side of the book once our own volume is taken out.
fn top_excluding(levels: &[Order], own: &HashMap<Decimal, Decimal>) -> Option<Decimal> {
    levels.iter().find_map(|level| {
        let price = level.price.value();
        let mine = own.get(&price.normalize()).copied().unwrap_or(Decimal::ZERO);
        (level.volume.value() - mine > Decimal::ZERO).then_some(price)
    })
}
