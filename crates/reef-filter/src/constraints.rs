//! Drops operations below the market's minimum order size.

use reef_core::{ManageOffer, Number, OrderConstraints, TradingPair};

use crate::error::FilterResult;
use crate::ops::{filter_ops, op_view, Verdict};

#[derive(Debug, Clone)]
pub struct ConstraintsFilter {
    pair: TradingPair,
    constraints: OrderConstraints,
}

impl ConstraintsFilter {
    pub fn new(pair: TradingPair, constraints: OrderConstraints) -> Self {
        Self { pair, constraints }
    }

    pub fn apply(&self, ops: Vec<ManageOffer>) -> FilterResult<Vec<ManageOffer>> {
        filter_ops("order_constraints", ops, |op| {
            let Some(view) = op_view(&self.pair, op)? else {
                return Ok(Verdict::Keep);
            };
            let base = Number::from_decimal(view.base, self.constraints.volume_precision)?;
            let quote = Number::from_decimal(view.quote, self.constraints.volume_precision)?;
            if self.constraints.is_below_minimum(&base, &quote) {
                Ok(Verdict::Drop)
            } else {
                Ok(Verdict::Keep)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::*;

    fn filter() -> ConstraintsFilter {
        ConstraintsFilter::new(
            pair(),
            OrderConstraints::new(7, 7, num("1"), Some(num("2"))),
        )
    }

    #[test]
    fn test_small_create_omitted_small_modify_deleted() {
        let ops = vec![
            sell(0, "0.5", "0.9"), // base below 1
            sell(4, "0.5", "3"),   // quote 1.5 below 2
            sell(0, "1", "5"),
        ];
        let out = filter().apply(ops).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].is_delete() && out[0].offer_id == 4);
        assert_eq!(out[1].amount, num("5"));
    }

    #[test]
    fn test_buy_measured_in_base_and_quote() {
        // 1 USD at 2 native per USD: base 2, quote 1 (below quote minimum)
        let out = filter().apply(vec![buy(0, "2", "1")]).unwrap();
        assert!(out.is_empty());
        // 3 USD: base 6, quote 3
        let out = filter().apply(vec![buy(0, "2", "3")]).unwrap();
        assert_eq!(out.len(), 1);
    }
}
