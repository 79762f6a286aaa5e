//! Two-sided strategy built from a buy leg and a sell leg.
//!
//! The buy leg is a side strategy run with the pair flipped: it sells quote
//! for base. Its prices are therefore base per quote and its top price has to
//! be inverted before it can be compared with the sell leg.

use std::sync::Arc;

use reef_core::{Asset, ManageOffer, Number, Offer};
use reef_exchange::{BoxFuture, FillHandler};
use reef_ledger::OfferBuilder;
use tracing::debug;

use crate::error::{StrategyError, StrategyResult};
use crate::side::{DeleteSideStrategy, SideStrategy};

pub trait Strategy: Send {
    fn pre_update(
        &mut self,
        max_base: Number,
        max_quote: Number,
        trust_base: Number,
        trust_quote: Number,
    ) -> BoxFuture<'_, StrategyResult<()>>;

    /// Returns the deletes plus the remaining (buying, selling) offers.
    fn prune_existing_offers(
        &mut self,
        buying_offers: Vec<Offer>,
        selling_offers: Vec<Offer>,
        builder: &OfferBuilder,
    ) -> (Vec<ManageOffer>, Vec<Offer>, Vec<Offer>);

    fn update_with_ops(
        &mut self,
        buying_offers: &[Offer],
        selling_offers: &[Offer],
        builder: &mut OfferBuilder,
    ) -> StrategyResult<Vec<ManageOffer>>;

    fn post_update(&mut self) -> StrategyResult<()>;

    fn fill_handlers(&self) -> Vec<Arc<dyn FillHandler>>;
}

pub struct ComposeStrategy {
    base: Asset,
    quote: Asset,
    buy: Box<dyn SideStrategy>,
    sell: Box<dyn SideStrategy>,
}

impl ComposeStrategy {
    pub fn new(
        base: Asset,
        quote: Asset,
        buy: Box<dyn SideStrategy>,
        sell: Box<dyn SideStrategy>,
    ) -> Self {
        Self {
            base,
            quote,
            buy,
            sell,
        }
    }

    /// Strategy that removes every offer on both sides.
    pub fn delete(base: Asset, quote: Asset) -> Self {
        Self::new(base, quote, Box::new(DeleteSideStrategy), Box::new(DeleteSideStrategy))
    }

    pub fn base(&self) -> &Asset {
        &self.base
    }

    pub fn quote(&self) -> &Asset {
        &self.quote
    }
}

impl Strategy for ComposeStrategy {
    fn pre_update(
        &mut self,
        max_base: Number,
        max_quote: Number,
        trust_base: Number,
        trust_quote: Number,
    ) -> BoxFuture<'_, StrategyResult<()>> {
        Box::pin(async move {
            let buy = self
                .buy
                .pre_update(max_quote, max_base, trust_quote, trust_base)
                .await;
            let sell = self
                .sell
                .pre_update(max_base, max_quote, trust_base, trust_quote)
                .await;
            StrategyError::combine(buy, sell).map(|_| ())
        })
    }

    fn prune_existing_offers(
        &mut self,
        buying_offers: Vec<Offer>,
        selling_offers: Vec<Offer>,
        builder: &OfferBuilder,
    ) -> (Vec<ManageOffer>, Vec<Offer>, Vec<Offer>) {
        let (mut ops, buying) = self.buy.prune_existing_offers(buying_offers, builder);
        let (sell_ops, selling) = self.sell.prune_existing_offers(selling_offers, builder);
        ops.extend(sell_ops);
        (ops, buying, selling)
    }

    fn update_with_ops(
        &mut self,
        buying_offers: &[Offer],
        selling_offers: &[Offer],
        builder: &mut OfferBuilder,
    ) -> StrategyResult<Vec<ManageOffer>> {
        let buy = self.buy.update_with_ops(buying_offers, builder);
        let sell = self.sell.update_with_ops(selling_offers, builder);
        let ((buy_ops, buy_top), (sell_ops, _)) = StrategyError::combine(buy, sell)?;

        // top of the buy leg in quote-per-base terms
        let top_bid = buy_top.map(|p| p.invert()).transpose()?;
        let sell_first = match (top_bid, selling_offers.first()) {
            (Some(bid), Some(ask)) => bid.value() >= ask.price.value(),
            _ => false,
        };
        debug!(
            top_bid = ?top_bid.map(|b| b.to_string()),
            lowest_ask = ?selling_offers.first().map(|o| o.price.to_string()),
            sell_first,
            "Ordering buy and sell operations"
        );

        let mut ops = Vec::with_capacity(buy_ops.len() + sell_ops.len());
        if sell_first {
            ops.extend(sell_ops);
            ops.extend(buy_ops);
        } else {
            ops.extend(buy_ops);
            ops.extend(sell_ops);
        }
        Ok(ops)
    }

    fn post_update(&mut self) -> StrategyResult<()> {
        let buy = self.buy.post_update();
        let sell = self.sell.post_update();
        StrategyError::combine(buy, sell).map(|_| ())
    }

    fn fill_handlers(&self) -> Vec<Arc<dyn FillHandler>> {
        let mut handlers = self.buy.fill_handlers();
        handlers.extend(self.sell.fill_handlers());
        handlers
    }
}
