//! Caps how much of the base or quote asset is traded per day.
//!
//! The booked volume comes from a [`DailyVolumeSource`]. Operations kept by
//! this filter are added to a running total for the rest of the batch, so
//! several creates cannot each use the same remaining capacity.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use reef_core::{ManageOffer, Number, Rounding, TradingPair, LEDGER_PRECISION};
use reef_exchange::DailyVolumeSource;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{FilterError, FilterResult};
use crate::ops::{filter_ops, op_view, Action, Verdict};

/// What to do with an operation that would exceed the cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeMode {
    /// Shrink it to whatever capacity is left.
    Exact,
    /// Drop it.
    Ignore,
}

pub struct DailyVolumeFilter {
    pair: TradingPair,
    action: Action,
    base_cap: Option<Decimal>,
    quote_cap: Option<Decimal>,
    mode: VolumeMode,
    source: Arc<dyn DailyVolumeSource>,
}

impl DailyVolumeFilter {
    pub fn new(
        pair: TradingPair,
        action: Action,
        base_cap: Option<Decimal>,
        quote_cap: Option<Decimal>,
        mode: VolumeMode,
        source: Arc<dyn DailyVolumeSource>,
    ) -> FilterResult<Self> {
        if base_cap.is_none() && quote_cap.is_none() {
            return Err(FilterError::InvalidConfig(
                "daily volume filter needs a base or quote cap".to_string(),
            ));
        }
        let negative = |cap: Option<Decimal>| cap.is_some_and(|c| c.is_sign_negative());
        if negative(base_cap) || negative(quote_cap) {
            return Err(FilterError::InvalidConfig(
                "daily volume caps must not be negative".to_string(),
            ));
        }
        Ok(Self {
            pair,
            action,
            base_cap,
            quote_cap,
            mode,
            source,
        })
    }

    pub fn apply(&self, ops: Vec<ManageOffer>) -> FilterResult<Vec<ManageOffer>> {
        self.apply_on(ops, Utc::now().date_naive())
    }

    /// Filter against the volume booked on `day`.
    pub fn apply_on(&self, ops: Vec<ManageOffer>, day: NaiveDate) -> FilterResult<Vec<ManageOffer>> {
        let booked = self.source.daily_volume(day);
        let (mut base_used, mut quote_used) = match self.action {
            Action::Sell => (booked.sold_base.value(), booked.sold_quote.value()),
            Action::Buy => (booked.bought_base.value(), booked.bought_quote.value()),
        };

        filter_ops("daily_volume", ops, |op| {
            let Some(view) = op_view(&self.pair, op)? else {
                return Ok(Verdict::Keep);
            };
            if view.action != self.action {
                return Ok(Verdict::Keep);
            }

            let remaining_base = self.base_cap.map(|cap| cap - base_used);
            let remaining_quote = self.quote_cap.map(|cap| cap - quote_used);
            let fits = remaining_base.map_or(true, |r| view.base <= r)
                && remaining_quote.map_or(true, |r| view.quote <= r);
            if fits {
                base_used += view.base;
                quote_used += view.quote;
                return Ok(Verdict::Keep);
            }

            if self.mode == VolumeMode::Ignore {
                info!(
                    op = %op,
                    base_used = %base_used,
                    quote_used = %quote_used,
                    "Daily volume cap reached, dropping"
                );
                return Ok(Verdict::Drop);
            }

            let allowed = self.allowed_amount(op, view.base, view.quote, remaining_base, remaining_quote)?;
            let amount = Number::from_decimal_with(allowed, LEDGER_PRECISION, Rounding::Truncate)?;
            if !amount.is_positive() {
                info!(op = %op, "Daily volume exhausted, dropping");
                return Ok(Verdict::Drop);
            }

            let shrunk = ManageOffer {
                amount,
                ..op.clone()
            };
            if let Some(v) = op_view(&self.pair, &shrunk)? {
                base_used += v.base;
                quote_used += v.quote;
            }
            info!(from = %op.amount, to = %amount, "Daily volume cap reached, shrinking");
            Ok(Verdict::Replace(shrunk))
        })
    }

    /// Largest operation amount, in the op's own selling units, that fits both caps.
    fn allowed_amount(
        &self,
        op: &ManageOffer,
        base: Decimal,
        quote: Decimal,
        remaining_base: Option<Decimal>,
        remaining_quote: Option<Decimal>,
    ) -> FilterResult<Decimal> {
        let price = op.price.value();
        let zero_price = || FilterError::Failed {
            filter: "daily_volume",
            reason: format!("zero price on {op}"),
        };
        let allowed = match self.action {
            // amount is base; price is quote per base
            Action::Sell => {
                let mut allowed = base;
                if let Some(r) = remaining_base {
                    allowed = allowed.min(r);
                }
                if let Some(r) = remaining_quote {
                    allowed = allowed.min(r.checked_div(price).ok_or_else(zero_price)?);
                }
                allowed
            }
            // amount is quote; price is base per quote
            Action::Buy => {
                let mut allowed = quote;
                if let Some(r) = remaining_quote {
                    allowed = allowed.min(r);
                }
                if let Some(r) = remaining_base {
                    allowed = allowed.min(r.checked_div(price).ok_or_else(zero_price)?);
                }
                allowed
            }
        };
        Ok(allowed.max(Decimal::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::test_support::*;
    use reef_exchange::DailyVolume;
    use rust_decimal_macros::dec;

    struct Booked(DailyVolume);

    impl DailyVolumeSource for Booked {
        fn daily_volume(&self, _day: NaiveDate) -> DailyVolume {
            self.0
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    fn filter(
        action: Action,
        base: Option<Decimal>,
        quote: Option<Decimal>,
        mode: VolumeMode,
        booked: DailyVolume,
    ) -> DailyVolumeFilter {
        DailyVolumeFilter::new(pair(), action, base, quote, mode, Arc::new(Booked(booked))).unwrap()
    }

    #[test]
    fn test_requires_a_cap() {
        let r = DailyVolumeFilter::new(
            pair(),
            Action::Sell,
            None,
            None,
            VolumeMode::Exact,
            Arc::new(Booked(DailyVolume::default())),
        );
        assert!(matches!(r, Err(FilterError::InvalidConfig(_))));
    }

    #[test]
    fn test_exact_shrinks_to_remaining_base() {
        let booked = DailyVolume {
            sold_base: num("90"),
            ..Default::default()
        };
        let f = filter(Action::Sell, Some(dec!(100)), None, VolumeMode::Exact, booked);
        let ops = vec![
            sell(0, "0.5", "5"),
            sell(0, "0.6", "10"),
            sell(0, "0.7", "10"),
            buy(0, "2", "50"),
        ];
        let out = f.apply_on(ops, day()).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].amount, num("5"));
        assert_eq!(out[1].amount, num("5"));
        // cap used up by the first two; buys are not limited
        assert!(out[2].is_side(&usd(), &reef_core::Asset::Native));
    }

    #[test]
    fn test_ignore_drops_and_converts_modify() {
        let booked = DailyVolume {
            bought_quote: num("8"),
            ..Default::default()
        };
        let f = filter(Action::Buy, None, Some(dec!(10)), VolumeMode::Ignore, booked);
        let out = f.apply_on(vec![buy(3, "2", "5"), buy(0, "2", "1")], day()).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out[0].is_delete() && out[0].offer_id == 3);
        assert_eq!(out[1].amount, num("1"));
    }

    #[test]
    fn test_exact_quote_cap_on_sell() {
        let f = filter(Action::Sell, None, Some(dec!(10)), VolumeMode::Exact, DailyVolume::default());
        let out = f.apply_on(vec![sell(0, "2", "10")], day()).unwrap();
        assert_eq!(out[0].amount, num("5"));
    }

    #[test]
    fn test_exact_base_cap_on_buy() {
        // 10 USD at 2 native per USD buys 20 native; only 6 native left
        let booked = DailyVolume {
            bought_base: num("4"),
            ..Default::default()
        };
        let f = filter(Action::Buy, Some(dec!(10)), None, VolumeMode::Exact, booked);
        let out = f.apply_on(vec![buy(0, "2", "10")], day()).unwrap();
        assert_eq!(out[0].amount, num("3"));
    }

    #[test]
    fn test_exhausted_cap_drops() {
        let booked = DailyVolume {
            sold_base: num("100"),
            ..Default::default()
        };
        let f = filter(Action::Sell, Some(dec!(100)), None, VolumeMode::Exact, booked);
        assert!(f.apply_on(vec![sell(0, "1", "1")], day()).unwrap().is_empty());
    }
}
