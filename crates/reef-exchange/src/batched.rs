//! Runs ledger-style offer operations against a centralized exchange.
//!
//! Open orders are given local numeric offer ids when loaded so the rest of the
//! engine can treat them exactly like ledger offers. A modify becomes a cancel
//! followed by an add; a delete is a cancel; a create is an add.

use std::collections::HashMap;
use std::sync::Arc;

use reef_core::{Command, ManageOffer, Number, Offer, OpenOrder, Order, OrderSide, TradingPair};
use tracing::{debug, info};

use crate::api::Exchange;
use crate::error::{ExchangeError, ExchangeResult};

pub struct BatchedExchange {
    inner: Arc<dyn Exchange>,
    pair: TradingPair,
    simulate: bool,
    tracked: HashMap<u64, OpenOrder>,
}

impl BatchedExchange {
    pub fn new(inner: Arc<dyn Exchange>, pair: TradingPair, simulate: bool) -> Self {
        Self {
            inner,
            pair,
            simulate,
            tracked: HashMap::new(),
        }
    }

    /// Load open orders as offers, split into (selling base, selling quote).
    pub async fn load_offers(&mut self) -> ExchangeResult<(Vec<Offer>, Vec<Offer>)> {
        let open = self.inner.open_orders(&self.pair).await?;
        self.tracked.clear();

        let mut selling = Vec::new();
        let mut buying = Vec::new();
        for (index, order) in open.into_iter().enumerate() {
            let id = index as u64 + 1;
            let offer = self.offer_from_open_order(id, &order)?;
            match order.order.side {
                OrderSide::Sell => selling.push(offer),
                OrderSide::Buy => buying.push(offer),
            }
            self.tracked.insert(id, order);
        }
        selling.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
        buying.sort_by(|a, b| a.price.partial_cmp(&b.price).unwrap_or(std::cmp::Ordering::Equal));
        Ok((selling, buying))
    }

    fn offer_from_open_order(&self, id: u64, open: &OpenOrder) -> ExchangeResult<Offer> {
        let constraints = self.inner.order_constraints(&self.pair);
        let remaining = remaining_volume(open);
        let offer = match open.order.side {
            OrderSide::Sell => Offer {
                id,
                seller: String::new(),
                selling: self.pair.base.clone(),
                buying: self.pair.quote.clone(),
                price: open.order.price,
                amount: remaining,
            },
            OrderSide::Buy => Offer {
                id,
                seller: String::new(),
                selling: self.pair.quote.clone(),
                buying: self.pair.base.clone(),
                price: open.order.price.invert_to(constraints.price_precision)?,
                amount: remaining.multiply(&open.order.price),
            },
        };
        Ok(offer)
    }

    fn order_from_op(&self, op: &ManageOffer) -> ExchangeResult<Order> {
        let constraints = self.inner.order_constraints(&self.pair);
        let (side, price, volume) = if op.is_side(&self.pair.base, &self.pair.quote) {
            (OrderSide::Sell, op.price, op.amount)
        } else if op.is_side(&self.pair.quote, &self.pair.base) {
            // op sells quote at base-per-quote; the order buys base at quote-per-base
            let price = op.price.invert_to(constraints.price_precision)?;
            let volume = op
                .amount
                .multiply(&op.price)
                .rescale_truncate(constraints.volume_precision)?;
            (OrderSide::Buy, price, volume)
        } else {
            return Err(ExchangeError::AssetMismatch(self.pair.to_string()));
        };
        Ok(Order {
            pair: self.pair.clone(),
            side,
            price,
            volume,
            timestamp: None,
        })
    }

    /// Translate operations to commands, in the order the operations were given.
    pub fn translate_ops(&self, ops: &[ManageOffer]) -> ExchangeResult<Vec<Command>> {
        let mut commands = Vec::with_capacity(ops.len());
        for op in ops {
            if !op.is_create() {
                let open = self
                    .tracked
                    .get(&op.offer_id)
                    .ok_or(ExchangeError::UnknownOffer(op.offer_id))?;
                commands.push(Command::Cancel(open.clone()));
            }
            if !op.is_delete() {
                commands.push(Command::Add(self.order_from_op(op)?));
            }
        }
        Ok(commands)
    }

    /// Execute operations. Returns the venue ids of orders that were added.
    pub async fn submit_ops(&mut self, ops: &[ManageOffer]) -> ExchangeResult<Vec<String>> {
        let commands = self.translate_ops(ops)?;
        let mut added = Vec::new();
        for command in &commands {
            if self.simulate {
                info!(%command, "Simulated command, not sent");
                continue;
            }
            match command {
                Command::Add(order) => {
                    let id = self.inner.add_order(order).await?;
                    debug!(%order, id = %id, "Order added");
                    added.push(id);
                }
                Command::Cancel(open) => {
                    self.inner.cancel_order(open).await?;
                    debug!(id = %open.id, "Order cancelled");
                }
            }
        }
        for op in ops.iter().filter(|op| !op.is_create()) {
            self.tracked.remove(&op.offer_id);
        }
        info!(commands = commands.len(), added = added.len(), "Submitted command batch");
        Ok(added)
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }
}

/// Remaining base volume of an open order.
pub fn remaining_volume(open: &OpenOrder) -> Number {
    open.order.volume.subtract(&open.volume_executed)
}
