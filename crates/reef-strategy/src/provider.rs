//! Level providers.
//!
//! A provider turns market state into the ordered list of levels one side
//! should quote. Levels are in the side's own terms: price is units of the
//! asset bought per unit sold, ascending away from the touch.

use std::sync::Arc;

use reef_core::{Level, Number};
use reef_exchange::{BoxFuture, FillHandler};

use crate::error::{StrategyError, StrategyResult};

pub trait LevelProvider: Send {
    /// Levels to quote given the current selling (`max_base`) and buying
    /// (`max_quote`) balances.
    fn get_levels(&mut self, max_base: Number, max_quote: Number) -> BoxFuture<'_, StrategyResult<Vec<Level>>>;

    /// Handlers that want to observe fills, e.g. to move their price.
    fn fill_handlers(&self) -> Vec<Arc<dyn FillHandler>> {
        Vec::new()
    }
}

/// Quotes a fixed list of levels.
#[derive(Debug, Clone)]
pub struct FixedLevelProvider {
    levels: Vec<Level>,
}

impl FixedLevelProvider {
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    /// Build the buy leg from bids written as (quote per base, base amount).
    ///
    /// The buy leg sells quote, so each bid becomes a level priced in base per
    /// quote with its amount in quote units.
    pub fn for_buy_side(bids: &[Level], price_precision: u32) -> StrategyResult<Self> {
        let levels = bids
            .iter()
            .map(|bid| {
                if !bid.price.is_positive() {
                    return Err(StrategyError::InvalidLevels(format!(
                        "bid price must be positive, got {}",
                        bid.price
                    )));
                }
                Ok(Level::new(
                    bid.price.invert_to(price_precision)?,
                    bid.amount.multiply(&bid.price),
                ))
            })
            .collect::<StrategyResult<Vec<_>>>()?;
        Ok(Self { levels })
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }
}

impl LevelProvider for FixedLevelProvider {
    fn get_levels(&mut self, _max_base: Number, _max_quote: Number) -> BoxFuture<'_, StrategyResult<Vec<Level>>> {
        let levels = self.levels.clone();
        Box::pin(async move { Ok(levels) })
    }
}
