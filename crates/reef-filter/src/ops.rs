//! Shared helpers for looking at operations in market terms.

use reef_core::{Asset, ManageOffer, Number, Offer, TradingPair};
use reef_telemetry::Metrics;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{FilterError, FilterResult};

/// Which way an operation trades the base asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Sells base for quote.
    Sell,
    /// Sells quote for base.
    Buy,
}

/// An operation expressed in base/quote terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarketView {
    pub action: Action,
    /// Quote per base.
    pub price: Decimal,
    pub base: Decimal,
    pub quote: Decimal,
}

fn view(
    pair: &TradingPair,
    selling: &Asset,
    buying: &Asset,
    price: &Number,
    amount: &Number,
) -> FilterResult<Option<MarketView>> {
    let (price, amount) = (price.value(), amount.value());
    if selling == &pair.base && buying == &pair.quote {
        return Ok(Some(MarketView {
            action: Action::Sell,
            price,
            base: amount,
            quote: amount * price,
        }));
    }
    if selling == &pair.quote && buying == &pair.base {
        let inverted = Decimal::ONE
            .checked_div(price)
            .ok_or_else(|| FilterError::Failed {
                filter: "market_view",
                reason: format!("zero price on buy operation selling {amount}"),
            })?;
        return Ok(Some(MarketView {
            action: Action::Buy,
            price: inverted,
            base: amount * price,
            quote: amount,
        }));
    }
    Ok(None)
}

/// Base/quote view of an operation, `None` if it is not on `pair`.
pub fn op_view(pair: &TradingPair, op: &ManageOffer) -> FilterResult<Option<MarketView>> {
    view(pair, &op.selling, &op.buying, &op.price, &op.amount)
}

/// Base/quote view of a resting offer, `None` if it is not on `pair`.
pub fn offer_view(pair: &TradingPair, offer: &Offer) -> FilterResult<Option<MarketView>> {
    view(pair, &offer.selling, &offer.buying, &offer.price, &offer.amount)
}

/// What a filter decided for one create or modify.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Keep,
    /// Keep a rewritten operation in place of the original.
    Replace(ManageOffer),
    Drop,
}

/// Run `decide` over every create and modify.
///
/// Deletes pass through untouched. A dropped modify becomes a delete of the
/// same offer; a dropped create disappears.
pub fn filter_ops<F>(
    name: &'static str,
    ops: Vec<ManageOffer>,
    mut decide: F,
) -> FilterResult<Vec<ManageOffer>>
where
    F: FnMut(&ManageOffer) -> FilterResult<Verdict>,
{
    let mut out = Vec::with_capacity(ops.len());
    for op in ops {
        if op.is_delete() {
            out.push(op);
            continue;
        }
        match decide(&op)? {
            Verdict::Keep => out.push(op),
            Verdict::Replace(new_op) => {
                debug!(filter = name, from = %op, to = %new_op, "Operation rewritten");
                Metrics::filter_action(name, "shrunk");
                out.push(new_op);
            }
            Verdict::Drop => match op.to_delete() {
                Some(delete) => {
                    debug!(filter = name, op = %op, "Modify dropped, deleting offer instead");
                    Metrics::filter_action(name, "deleted");
                    out.push(delete);
                }
                None => {
                    debug!(filter = name, op = %op, "Create dropped");
                    Metrics::filter_action(name, "dropped");
                }
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
pub(crate) mod test_support {
    use reef_core::{Asset, ManageOffer, Number, Offer, TradingPair};

    pub fn usd() -> Asset {
        Asset::credit("USD", "GISSUER")
    }

    /// base = native, quote = USD
    pub fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, usd())
    }

    pub fn num(s: &str) -> Number {
        s.parse().unwrap()
    }

    pub fn sell(id: u64, price: &str, amount: &str) -> ManageOffer {
        ManageOffer {
            offer_id: id,
            selling: Asset::Native,
            buying: usd(),
            price: num(price),
            amount: num(amount),
            source_account: None,
        }
    }

    /// Buy op with price and amount in ledger terms (native per USD, USD).
    pub fn buy(id: u64, price: &str, amount: &str) -> ManageOffer {
        ManageOffer {
            offer_id: id,
            selling: usd(),
            buying: Asset::Native,
            price: num(price),
            amount: num(amount),
            source_account: None,
        }
    }

    pub fn resting(op: &ManageOffer) -> Offer {
        Offer {
            id: op.offer_id,
            seller: "GME".to_string(),
            selling: op.selling.clone(),
            buying: op.buying.clone(),
            price: op.price,
            amount: op.amount,
        }
    }
}
