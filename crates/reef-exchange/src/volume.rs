//! Per-day traded volume, fed by fills.

use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use parking_lot::Mutex;
use reef_core::{OrderSide, Trade, TradingPair};
use tracing::debug;

use crate::api::{BoxFuture, DailyVolume, DailyVolumeSource, FillHandler};
use crate::error::ExchangeResult;

#[derive(Debug, Default)]
struct DayBook {
    day: Option<NaiveDate>,
    volume: DailyVolume,
    seen: HashSet<String>,
}

/// Accumulates base and quote volume per UTC trading day.
///
/// Fills are keyed by transaction id, so a fill delivered twice is counted
/// once. Fills from a day earlier than the current one are ignored.
pub struct DailyVolumeTracker {
    pair: TradingPair,
    book: Mutex<DayBook>,
}

impl DailyVolumeTracker {
    pub fn new(pair: TradingPair) -> Self {
        Self {
            pair,
            book: Mutex::new(DayBook::default()),
        }
    }

    /// Book one fill. Returns false if it was a duplicate, stale or for another pair.
    pub fn record(&self, trade: &Trade) -> bool {
        if trade.order.pair != self.pair {
            return false;
        }
        let day = trade
            .order
            .timestamp
            .unwrap_or_else(Utc::now)
            .date_naive();

        let mut book = self.book.lock();
        match book.day {
            Some(current) if day < current => return false,
            Some(current) if day == current => {}
            _ => {
                book.day = Some(day);
                book.volume = DailyVolume::default();
                book.seen.clear();
            }
        }
        if !book.seen.insert(trade.transaction_id.clone()) {
            return false;
        }

        let base = trade.order.volume;
        let quote = trade.cost;
        let v = &mut book.volume;
        match trade.order.side {
            OrderSide::Sell => {
                v.sold_base = v.sold_base.add(&base);
                v.sold_quote = v.sold_quote.add(&quote);
            }
            OrderSide::Buy => {
                v.bought_base = v.bought_base.add(&base);
                v.bought_quote = v.bought_quote.add(&quote);
            }
        }
        debug!(%day, tx = %trade.transaction_id, volume = ?book.volume, "Daily volume updated");
        true
    }
}

impl FillHandler for DailyVolumeTracker {
    fn handle_fill<'a>(&'a self, trade: &'a Trade) -> BoxFuture<'a, ExchangeResult<()>> {
        Box::pin(async move {
            self.record(trade);
            Ok(())
        })
    }
}

impl DailyVolumeSource for DailyVolumeTracker {
    fn daily_volume(&self, day: NaiveDate) -> DailyVolume {
        let book = self.book.lock();
        match book.day {
            Some(current) if current == day => book.volume,
            _ => DailyVolume::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reef_core::{Asset, Number, Order};

    fn pair() -> TradingPair {
        TradingPair::new(Asset::Native, Asset::credit("USD", "G1"))
    }

    fn fill(tx: &str, side: OrderSide, volume: &str, cost: &str, day: u32) -> Trade {
        Trade {
            order: Order {
                pair: pair(),
                side,
                price: "0.5".parse().unwrap(),
                volume: volume.parse().unwrap(),
                timestamp: Some(Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()),
            },
            transaction_id: tx.to_string(),
            cursor: tx.to_string(),
            cost: cost.parse().unwrap(),
            fee: Number::zero(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_accumulates_by_side() {
        let tracker = DailyVolumeTracker::new(pair());
        assert!(tracker.record(&fill("a", OrderSide::Sell, "10", "5", 4)));
        assert!(tracker.record(&fill("b", OrderSide::Sell, "4", "2", 4)));
        assert!(tracker.record(&fill("c", OrderSide::Buy, "6", "3", 4)));

        let v = tracker.daily_volume(day(4));
        assert_eq!(v.sold_base, "14".parse().unwrap());
        assert_eq!(v.sold_quote, "7".parse().unwrap());
        assert_eq!(v.bought_base, "6".parse().unwrap());
        assert_eq!(v.bought_quote, "3".parse().unwrap());
    }

    #[test]
    fn test_duplicates_and_old_days_ignored() {
        let tracker = DailyVolumeTracker::new(pair());
        assert!(tracker.record(&fill("a", OrderSide::Sell, "10", "5", 5)));
        assert!(!tracker.record(&fill("a", OrderSide::Sell, "10", "5", 5)));
        assert!(!tracker.record(&fill("old", OrderSide::Sell, "10", "5", 4)));
        assert_eq!(tracker.daily_volume(day(5)).sold_base, "10".parse().unwrap());
    }

    #[test]
    fn test_rolls_over_to_new_day() {
        let tracker = DailyVolumeTracker::new(pair());
        tracker.record(&fill("a", OrderSide::Sell, "10", "5", 5));
        tracker.record(&fill("b", OrderSide::Buy, "1", "1", 6));

        assert!(tracker.daily_volume(day(5)).sold_base.is_zero());
        let v = tracker.daily_volume(day(6));
        assert!(v.sold_base.is_zero());
        assert_eq!(v.bought_base, "1".parse().unwrap());
    }
}
