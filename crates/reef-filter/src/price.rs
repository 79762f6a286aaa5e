//! Keeps operations within a configured price range.
//!
//! Bounds are in quote per base for both sides, so buy prices are inverted
//! before the comparison.

use reef_core::{ManageOffer, TradingPair};
use rust_decimal::Decimal;

use crate::error::{FilterError, FilterResult};
use crate::ops::{filter_ops, op_view, Verdict};

#[derive(Debug, Clone)]
pub struct PriceBoundsFilter {
    pair: TradingPair,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
}

impl PriceBoundsFilter {
    pub fn new(
        pair: TradingPair,
        min_price: Option<Decimal>,
        max_price: Option<Decimal>,
    ) -> FilterResult<Self> {
        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err(FilterError::InvalidConfig(format!(
                    "price bounds: min {min} above max {max}"
                )));
            }
        }
        Ok(Self {
            pair,
            min_price,
            max_price,
        })
    }

    pub fn apply(&self, ops: Vec<ManageOffer>) -> FilterResult<Vec<ManageOffer>> {
        filter_ops("price_bounds", ops, |op| {
            let Some(view) = op_view(&self.pair, op)? else {
                return Ok(Verdict::Keep);
            };
            let below = self.min_price.is_some_and(|min| view.price < min);
            let above = self.max_price.is_some_and(|max| view.price > max);
            Ok(if below || above { Verdict::Drop } else { Verdict::Keep })
        })
    }
}
