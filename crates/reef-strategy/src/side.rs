//! Side strategies.
//!
//! A side strategy owns one direction of a market: it sells `selling` for
//! `buying`. It compares the offers resting on its side against the levels its
//! provider wants and emits the operations that close the gap, asking the
//! offer builder to check capacity for each one.

use std::sync::Arc;

use reef_core::{Asset, Level, ManageOffer, Number, Offer, Rounding, LEDGER_PRECISION};
use reef_exchange::{BoxFuture, FillHandler};
use reef_ledger::OfferBuilder;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::{StrategyError, StrategyResult};
use crate::provider::LevelProvider;

pub trait SideStrategy: Send {
    /// Load levels for this cycle given selling/buying balances and trust limits.
    fn pre_update(
        &mut self,
        max_selling: Number,
        max_buying: Number,
        trust_selling: Number,
        trust_buying: Number,
    ) -> BoxFuture<'_, StrategyResult<()>>;

    /// Delete offers beyond the number of levels. Returns the deletes and the
    /// offers that remain.
    fn prune_existing_offers(
        &mut self,
        offers: Vec<Offer>,
        builder: &OfferBuilder,
    ) -> (Vec<ManageOffer>, Vec<Offer>);

    /// Operations moving `offers` to the current levels, and the lowest price
    /// among the creates and modifies emitted.
    fn update_with_ops(
        &mut self,
        offers: &[Offer],
        builder: &mut OfferBuilder,
    ) -> StrategyResult<(Vec<ManageOffer>, Option<Number>)>;

    fn post_update(&mut self) -> StrategyResult<()> {
        Ok(())
    }

    fn fill_handlers(&self) -> Vec<Arc<dyn FillHandler>> {
        Vec::new()
    }
}

/// Levels must rise strictly away from the touch, with positive prices and
/// non-negative amounts. A zero amount asks for the offer at that level to go.
pub fn validate_levels(levels: &[Level]) -> StrategyResult<()> {
    if let Some(level) = levels
        .iter()
        .find(|l| !l.price.is_positive() || l.amount.is_negative())
    {
        return Err(StrategyError::InvalidLevels(format!(
            "level needs a positive price and non-negative amount, got {} @ {}",
            level.amount, level.price
        )));
    }
    for pair in levels.windows(2) {
        if pair[1].price.value() <= pair[0].price.value() {
            return Err(StrategyError::InvalidLevels(format!(
                "prices must be strictly ascending, got {} then {}",
                pair[0].price, pair[1].price
            )));
        }
    }
    Ok(())
}

pub struct SellSideStrategy {
    name: &'static str,
    selling: Asset,
    buying: Asset,
    provider: Box<dyn LevelProvider>,
    price_tolerance: Decimal,
    amount_tolerance: Decimal,
    divide_amount_by_price: bool,
    current_levels: Vec<Level>,
    max_selling: Number,
    max_buying: Number,
}

impl SellSideStrategy {
    /// `name` only labels logs ("sell" or "buy").
    pub fn new(
        name: &'static str,
        selling: Asset,
        buying: Asset,
        provider: Box<dyn LevelProvider>,
        price_tolerance: Decimal,
        amount_tolerance: Decimal,
        divide_amount_by_price: bool,
    ) -> StrategyResult<Self> {
        for (label, value) in [("price_tolerance", price_tolerance), ("amount_tolerance", amount_tolerance)] {
            if value < Decimal::ZERO || value >= Decimal::ONE {
                return Err(StrategyError::InvalidConfig(format!(
                    "{label} must be in [0, 1), got {value}"
                )));
            }
        }
        Ok(Self {
            name,
            selling,
            buying,
            provider,
            price_tolerance,
            amount_tolerance,
            divide_amount_by_price,
            current_levels: Vec::new(),
            max_selling: Number::zero(),
            max_buying: Number::zero(),
        })
    }

    pub fn current_levels(&self) -> &[Level] {
        &self.current_levels
    }

    fn target_amount(&self, level: &Level) -> StrategyResult<Number> {
        let amount = if self.divide_amount_by_price {
            level.amount.divide(&level.price)?
        } else {
            level.amount
        };
        Ok(amount.min(self.max_selling))
    }

    fn update_level(
        &self,
        offers: &[Offer],
        index: usize,
        builder: &mut OfferBuilder,
    ) -> StrategyResult<Option<ManageOffer>> {
        let level = &self.current_levels[index];
        let target_price = level.price;
        let mut target_amount = self.target_amount(level)?;

        let Some(offer) = offers.get(index) else {
            if !target_price.is_positive() || !target_amount.is_positive() {
                return Ok(None);
            }
            let incremental = builder.incremental_native_amount(true);
            let capacity = builder
                .tracker_mut()
                .available_capacity(&self.selling, incremental)?
                .selling;
            if capacity <= Decimal::ZERO {
                debug!(side = self.name, index, capacity = %capacity, "No capacity for a new offer");
                return Ok(None);
            }
            let capacity = Number::from_decimal_with(capacity, LEDGER_PRECISION, Rounding::Truncate)?;
            target_amount = target_amount.min(capacity);
            return Ok(builder.create_sell_offer(&self.selling, &self.buying, &target_price, &target_amount)?);
        };

        let one = Decimal::ONE;
        let price = target_price.value();
        let amount = target_amount.value();
        let highest_price = price * (one + self.price_tolerance);
        let lowest_price = price * (one - self.price_tolerance);
        let max_amount = amount * (one + self.amount_tolerance);
        let min_amount = amount * (one - self.amount_tolerance);

        let current_price = offer.price.value();
        let current_amount = offer.amount.value();
        let price_trigger = current_price > highest_price || current_price < lowest_price;
        let amount_trigger = current_amount > max_amount || current_amount < min_amount;

        if !price_trigger && !amount_trigger {
            builder.keep_offer(offer);
            return Ok(None);
        }

        debug!(
            side = self.name,
            offer_id = offer.id,
            current_price = %offer.price,
            target_price = %target_price,
            current_amount = %offer.amount,
            target_amount = %target_amount,
            "Offer outside tolerance"
        );
        if !target_amount.is_positive() {
            return Ok(Some(builder.delete_offer(offer)));
        }
        match builder.modify_sell_offer(offer, &target_price, &target_amount)? {
            Some(op) => Ok(Some(op)),
            None => {
                info!(side = self.name, offer_id = offer.id, "Cannot modify within capacity, deleting offer");
                Ok(Some(builder.delete_offer(offer)))
            }
        }
    }
}

impl SideStrategy for SellSideStrategy {
    fn pre_update(
        &mut self,
        max_selling: Number,
        max_buying: Number,
        _trust_selling: Number,
        trust_buying: Number,
    ) -> BoxFuture<'_, StrategyResult<()>> {
        Box::pin(async move {
            self.max_selling = max_selling;
            self.max_buying = max_buying;

            let nothing_to_sell = !max_selling.is_positive();
            let line_full = max_buying.value() >= trust_buying.value();
            if nothing_to_sell || line_full {
                self.current_levels.clear();
                info!(
                    side = self.name,
                    nothing_to_sell,
                    line_full,
                    "No capacity to place offers"
                );
                return Ok(());
            }

            let levels = self.provider.get_levels(max_selling, max_buying).await?;
            validate_levels(&levels)?;
            debug!(side = self.name, levels = levels.len(), "Loaded levels");
            self.current_levels = levels;
            Ok(())
        })
    }

    fn prune_existing_offers(
        &mut self,
        mut offers: Vec<Offer>,
        builder: &OfferBuilder,
    ) -> (Vec<ManageOffer>, Vec<Offer>) {
        let keep = self.current_levels.len();
        let ops: Vec<ManageOffer> = offers
            .iter()
            .skip(keep)
            .map(|o| builder.delete_offer(o))
            .collect();
        offers.truncate(keep);
        if !ops.is_empty() {
            debug!(side = self.name, deletes = ops.len(), "Pruned offers beyond levels");
        }
        (ops, offers)
    }

    fn update_with_ops(
        &mut self,
        offers: &[Offer],
        builder: &mut OfferBuilder,
    ) -> StrategyResult<(Vec<ManageOffer>, Option<Number>)> {
        let mut ops = Vec::new();
        let mut top: Option<Number> = None;
        for index in (0..self.current_levels.len()).rev() {
            let Some(op) = self.update_level(offers, index, builder)? else {
                continue;
            };
            if !op.is_delete() {
                top = Some(match top {
                    Some(t) => t.min(op.price),
                    None => op.price,
                });
            }
            ops.push(op);
        }
        Ok((ops, top))
    }

    fn fill_handlers(&self) -> Vec<Arc<dyn FillHandler>> {
        self.provider.fill_handlers()
    }
}

/// Deletes every offer on its side and places nothing.
#[derive(Debug, Default)]
pub struct DeleteSideStrategy;

impl SideStrategy for DeleteSideStrategy {
    fn pre_update(
        &mut self,
        _max_selling: Number,
        _max_buying: Number,
        _trust_selling: Number,
        _trust_buying: Number,
    ) -> BoxFuture<'_, StrategyResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn prune_existing_offers(
        &mut self,
        offers: Vec<Offer>,
        builder: &OfferBuilder,
    ) -> (Vec<ManageOffer>, Vec<Offer>) {
        let ops = offers.iter().map(|o| builder.delete_offer(o)).collect();
        (ops, Vec::new())
    }

    fn update_with_ops(
        &mut self,
        _offers: &[Offer],
        _builder: &mut OfferBuilder,
    ) -> StrategyResult<(Vec<ManageOffer>, Option<Number>)> {
        Ok((Vec::new(), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::FixedLevelProvider;
    use reef_core::TradingPair;
    use reef_ledger::{AccountSnapshot, BalanceLine, LedgerParams};
    use rust_decimal_macros::dec;

    fn usd() -> Asset {
        Asset::credit("USD", "GISSUER")
    }

    fn num(s: &str) -> Number {
        s.parse().unwrap()
    }

    fn level(p: &str, a: &str) -> Level {
        Level::new(num(p), num(a))
    }

    fn offer(id: u64, price: &str, amount: &str) -> Offer {
        Offer {
            id,
            seller: "GME".to_string(),
            selling: usd(),
            buying: Asset::Native,
            price: num(price),
            amount: num(amount),
        }
    }

    fn builder(usd_balance: Decimal, offers: Vec<Offer>) -> OfferBuilder {
        let mut b = OfferBuilder::new(LedgerParams::default(), "GME", "GME");
        let snapshot = AccountSnapshot {
            account_id: "GME".to_string(),
            balances: vec![
                BalanceLine {
                    asset: Asset::Native,
                    balance: dec!(1000),
                    limit: None,
                },
                BalanceLine {
                    asset: usd(),
                    balance: usd_balance,
                    limit: Some(dec!(100000)),
                },
            ],
            subentry_count: offers.len() as u32 + 1,
            offers,
        };
        b.reset_cycle(snapshot, &TradingPair::new(usd(), Asset::Native));
        b
    }

    fn strategy(levels: Vec<Level>) -> SellSideStrategy {
        SellSideStrategy::new(
            "sell",
            usd(),
            Asset::Native,
            Box::new(FixedLevelProvider::new(levels)),
            dec!(0.01),
            dec!(0.01),
            false,
        )
        .unwrap()
    }

    async fn loaded(levels: Vec<Level>, max_selling: &str) -> SellSideStrategy {
        let mut s = strategy(levels);
        s.pre_update(num(max_selling), num("0"), num("100000"), num("1000000"))
            .await
            .unwrap();
        s
    }

    #[test]
    fn test_tolerances_validated() {
        let bad = SellSideStrategy::new(
            "sell",
            usd(),
            Asset::Native,
            Box::new(FixedLevelProvider::new(vec![])),
            dec!(1),
            dec!(0),
            false,
        );
        assert!(matches!(bad, Err(StrategyError::InvalidConfig(_))));
    }

    #[test]
    fn test_validate_levels() {
        assert!(validate_levels(&[level("1", "1"), level("1.1", "1")]).is_ok());
        assert!(validate_levels(&[level("1", "1"), level("1", "1")]).is_err());
        assert!(validate_levels(&[level("1.1", "1"), level("1", "1")]).is_err());
        assert!(validate_levels(&[level("1", "0"), level("1.1", "1")]).is_ok());
    }

    #[tokio::test]
    async fn test_non_positive_price_rejected() {
        assert!(matches!(
            validate_levels(&[level("0", "1"), level("1", "1")]),
            Err(StrategyError::InvalidLevels(_))
        ));
        assert!(validate_levels(&[level("-1", "1")]).is_err());
        assert!(validate_levels(&[level("1", "-1")]).is_err());

        // a provider handing out a zero price fails the cycle instead of deleting
        let mut s = strategy(vec![level("0", "10")]);
        let result = s.pre_update(num("10"), num("0"), num("100"), num("100")).await;
        assert!(matches!(result, Err(StrategyError::InvalidLevels(_))));
        assert!(s.current_levels().is_empty());
    }

    #[tokio::test]
    async fn test_non_monotonic_levels_rejected() {
        let mut s = strategy(vec![level("1.1", "1"), level("1.0", "1")]);
        let result = s.pre_update(num("10"), num("0"), num("100"), num("100")).await;
        assert!(matches!(result, Err(StrategyError::InvalidLevels(_))));
    }

    #[tokio::test]
    async fn test_no_levels_without_capacity() {
        let mut s = strategy(vec![level("1.0", "10")]);
        s.pre_update(num("0"), num("5"), num("100"), num("100")).await.unwrap();
        assert!(s.current_levels().is_empty());

        s.pre_update(num("10"), num("100"), num("100"), num("100")).await.unwrap();
        assert!(s.current_levels().is_empty());

        s.pre_update(num("10"), num("5"), num("100"), num("100")).await.unwrap();
        assert_eq!(s.current_levels().len(), 1);
    }

    #[tokio::test]
    async fn test_prune_deletes_extra_offers() {
        let mut s = loaded(vec![level("1.0", "10")], "100").await;
        let offers = vec![offer(1, "1.0", "10"), offer(2, "1.1", "5"), offer(3, "1.2", "5")];
        let b = builder(dec!(100), offers.clone());

        let (ops, remaining) = s.prune_existing_offers(offers, &b);
        assert_eq!(ops.iter().map(|o| o.offer_id).collect::<Vec<_>>(), vec![2, 3]);
        assert!(ops.iter().all(|o| o.is_delete()));
        assert_eq!(remaining.len(), 1);
    }

    #[tokio::test]
    async fn test_reconciliation_scenario() {
        let offers = vec![offer(5, "1.00", "10"), offer(6, "1.05", "5")];
        let mut b = builder(dec!(100), offers.clone());
        let mut s = loaded(vec![level("1.00", "10")], "100").await;

        let (mut ops, remaining) = s.prune_existing_offers(offers, &b);
        let (update_ops, top) = s.update_with_ops(&remaining, &mut b).unwrap();
        ops.extend(update_ops);

        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].offer_id, 6);
        assert!(ops[0].is_delete());
        assert!(top.is_none());
    }

    #[tokio::test]
    async fn test_in_band_offers_are_idempotent() {
        let offers = vec![offer(1, "1.0", "10"), offer(2, "1.1", "10")];
        let mut b = builder(dec!(100), offers.clone());
        let mut s = loaded(vec![level("1.005", "10.05"), level("1.1", "10")], "100").await;

        let (ops, _) = s.update_with_ops(&offers, &mut b).unwrap();
        assert!(ops.is_empty());
        // kept offers count against capacity again
        assert_eq!(b.tracker_mut().asset_liabilities(&usd()).selling, dec!(20));
    }

    #[tokio::test]
    async fn test_creates_deepest_first_and_reports_top() {
        let mut b = builder(dec!(100), vec![]);
        let mut s = loaded(vec![level("1.0", "10"), level("1.2", "10")], "100").await;

        let (ops, top) = s.update_with_ops(&[], &mut b).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(ops.iter().all(|o| o.is_create()));
        assert_eq!(ops[0].price, num("1.2"));
        assert_eq!(ops[1].price, num("1.0"));
        assert_eq!(top, Some(num("1.0")));
    }

    #[tokio::test]
    async fn test_create_shrinks_to_capacity() {
        let mut b = builder(dec!(15), vec![]);
        let mut s = loaded(vec![level("1.0", "10"), level("1.2", "10")], "15").await;

        let (ops, _) = s.update_with_ops(&[], &mut b).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].amount, num("10"));
        assert_eq!(ops[1].amount, num("5"));

        // capacity now exhausted
        let (more, _) = s.update_with_ops(&[], &mut b).unwrap();
        assert!(more.is_empty());
    }

    #[tokio::test]
    async fn test_out_of_band_modifies() {
        let offers = vec![offer(1, "1.0", "10")];
        let mut b = builder(dec!(100), offers.clone());
        let mut s = loaded(vec![level("1.1", "10")], "100").await;

        let (ops, top) = s.update_with_ops(&offers, &mut b).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_modify());
        assert_eq!(ops[0].offer_id, 1);
        assert_eq!(top, Some(num("1.1")));
    }

    #[tokio::test]
    async fn test_zero_amount_level_deletes_existing_offer() {
        let offers = vec![offer(1, "1.0", "10")];
        let mut b = builder(dec!(100), offers.clone());
        let mut s = loaded(vec![level("1.0", "0")], "100").await;

        let (ops, top) = s.update_with_ops(&offers, &mut b).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(ops[0].is_delete());
        assert!(top.is_none());
    }

    #[tokio::test]
    async fn test_divide_amount_by_price() {
        let mut s = SellSideStrategy::new(
            "buy",
            usd(),
            Asset::Native,
            Box::new(FixedLevelProvider::new(vec![level("2", "10")])),
            dec!(0),
            dec!(0),
            true,
        )
        .unwrap();
        s.pre_update(num("100"), num("0"), num("100000"), num("1000000"))
            .await
            .unwrap();
        let mut b = builder(dec!(100), vec![]);
        let (ops, _) = s.update_with_ops(&[], &mut b).unwrap();
        assert_eq!(ops[0].amount, num("5"));
    }

    #[test]
    fn test_delete_strategy_prunes_everything() {
        let offers = vec![offer(1, "1.0", "10"), offer(2, "1.1", "5")];
        let mut b = builder(dec!(100), offers.clone());
        let mut s = DeleteSideStrategy;
        let (ops, remaining) = s.prune_existing_offers(offers, &b);
        assert_eq!(ops.len(), 2);
        assert!(remaining.is_empty());
        let (update, top) = s.update_with_ops(&remaining, &mut b).unwrap();
        assert!(update.is_empty() && top.is_none());
    }
}
