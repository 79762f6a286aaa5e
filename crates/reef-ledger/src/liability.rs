//! Liability and capacity accounting.
//!
//! Tracks, per asset, how much the account has already committed to sell and to
//! buy through resting offers, and answers whether a further commitment still
//! fits inside the balance, the reserve floor and the trust line limit.
//!
//! At the start of a cycle the liabilities of the traded pair's own offers are
//! removed from the cache; the strategy adds them back one by one as it decides
//! to keep, modify or replace each offer.

use std::collections::HashMap;

use reef_core::{Asset, Offer};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::client::AccountSnapshot;
use crate::error::{LedgerError, LedgerResult};
use crate::params::LedgerParams;

/// Committed exposure of one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Liabilities {
    pub buying: Decimal,
    pub selling: Decimal,
}

/// Balance, trust limit and untouchable floor of one asset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssetBalance {
    pub balance: Decimal,
    pub trust: Decimal,
    pub floor: Decimal,
}

fn offer_liabilities<'a>(offers: impl Iterator<Item = &'a Offer>, asset: &Asset) -> Liabilities {
    let mut result = Liabilities::default();
    for offer in offers {
        if &offer.selling == asset {
            result.selling += offer.amount.value();
        } else if &offer.buying == asset {
            result.buying += offer.amount.value() * offer.price.value();
        }
    }
    result
}

pub struct LiabilityTracker {
    params: LedgerParams,
    snapshot: AccountSnapshot,
    liabilities: HashMap<Asset, Liabilities>,
    balances: HashMap<Asset, AssetBalance>,
}

impl LiabilityTracker {
    pub fn new(params: LedgerParams) -> Self {
        Self {
            params,
            snapshot: AccountSnapshot::default(),
            liabilities: HashMap::new(),
            balances: HashMap::new(),
        }
    }

    pub fn params(&self) -> &LedgerParams {
        &self.params
    }

    pub fn snapshot(&self) -> &AccountSnapshot {
        &self.snapshot
    }

    /// Replace the account snapshot and drop both caches.
    pub fn load_snapshot(&mut self, snapshot: AccountSnapshot) {
        self.snapshot = snapshot;
        self.liabilities.clear();
        self.balances.clear();
    }

    pub fn reset_cached_balances(&mut self) {
        self.balances.clear();
    }

    /// Recompute liabilities for `base` and `quote` from every open offer except
    /// the ones trading `base` against `quote`.
    ///
    /// Offers on other pairs (possibly placed by other bots sharing the account)
    /// stay counted.
    pub fn reset_cached_liabilities(&mut self, base: &Asset, quote: &Asset) {
        self.liabilities.clear();
        for asset in [base, quote] {
            let all = offer_liabilities(self.snapshot.offers.iter(), asset);
            let pair = offer_liabilities(
                self.snapshot
                    .offers
                    .iter()
                    .filter(|o| {
                        (&o.selling == base && &o.buying == quote)
                            || (&o.selling == quote && &o.buying == base)
                    }),
                asset,
            );
            let remaining = Liabilities {
                buying: all.buying - pair.buying,
                selling: all.selling - pair.selling,
            };
            debug!(asset = %asset, buying = %remaining.buying, selling = %remaining.selling, "Reset cached liabilities");
            self.liabilities.insert(asset.clone(), remaining);
        }
    }

    /// Cached liabilities of `asset`, scanning every open offer on a miss.
    pub fn asset_liabilities(&mut self, asset: &Asset) -> Liabilities {
        if let Some(l) = self.liabilities.get(asset) {
            return *l;
        }
        let l = offer_liabilities(self.snapshot.offers.iter(), asset);
        self.liabilities.insert(asset.clone(), l);
        l
    }

    pub fn asset_balance(&mut self, asset: &Asset) -> LedgerResult<AssetBalance> {
        if let Some(b) = self.balances.get(asset) {
            return Ok(*b);
        }
        let line = self
            .snapshot
            .balance_line(asset)
            .ok_or_else(|| LedgerError::BalanceNotFound(asset.to_string()))?;

        let result = if asset.is_native() {
            let entries = Decimal::from(2 + self.snapshot.subentry_count);
            AssetBalance {
                balance: line.balance,
                trust: Decimal::MAX,
                floor: entries * self.params.base_reserve,
            }
        } else {
            AssetBalance {
                balance: line.balance,
                trust: line.limit.unwrap_or(Decimal::MAX),
                floor: line.balance * self.params.operational_buffer_non_native_pct,
            }
        };
        self.balances.insert(asset.clone(), result);
        Ok(result)
    }

    /// Room left to buy and to sell `asset`.
    ///
    /// `incremental_native` is the fee and reserve cost of the operation being
    /// considered and only reduces selling capacity of the native asset.
    pub fn available_capacity(
        &mut self,
        asset: &Asset,
        incremental_native: Decimal,
    ) -> LedgerResult<Liabilities> {
        let l = self.asset_liabilities(asset);
        let b = self.asset_balance(asset)?;
        let incremental = if asset.is_native() {
            incremental_native
        } else {
            Decimal::ZERO
        };
        Ok(Liabilities {
            buying: b.trust - l.buying,
            selling: b.balance - b.floor - l.selling - incremental,
        })
    }

    pub fn will_oversell(&mut self, asset: &Asset, amount: Decimal) -> LedgerResult<bool> {
        let b = self.asset_balance(asset)?;
        let l = self.asset_liabilities(asset);
        let result = l.selling + amount > b.balance - b.floor;
        if result {
            warn!(
                asset = %asset,
                selling_liabilities = %l.selling,
                amount = %amount,
                balance = %b.balance,
                floor = %b.floor,
                "Selling would exceed balance minus floor"
            );
        }
        Ok(result)
    }

    /// The native asset has no trust line and is never overbought.
    pub fn will_overbuy(&mut self, asset: &Asset, amount: Decimal) -> LedgerResult<bool> {
        if asset.is_native() {
            return Ok(false);
        }
        let b = self.asset_balance(asset)?;
        let l = self.asset_liabilities(asset);
        let result = l.buying + amount > b.trust;
        if result {
            warn!(
                asset = %asset,
                buying_liabilities = %l.buying,
                amount = %amount,
                trust = %b.trust,
                "Buying would exceed the trust line"
            );
        }
        Ok(result)
    }

    pub fn will_oversell_native(&mut self, incremental: Decimal) -> LedgerResult<bool> {
        let native = Asset::Native;
        let b = self.asset_balance(&native)?;
        let l = self.asset_liabilities(&native);
        let result = incremental > b.balance - b.floor - l.selling;
        if result {
            warn!(
                incremental = %incremental,
                native_balance = %b.balance,
                floor = %b.floor,
                native_selling_liabilities = %l.selling,
                "Fee and reserve would exceed spare native balance"
            );
        }
        Ok(result)
    }

    pub fn add_liabilities(
        &mut self,
        selling: &Asset,
        buying: &Asset,
        incremental_sell: Decimal,
        incremental_buy: Decimal,
        incremental_native: Decimal,
    ) {
        let mut s = self.asset_liabilities(selling);
        s.selling += incremental_sell;
        self.liabilities.insert(selling.clone(), s);

        let mut b = self.asset_liabilities(buying);
        b.buying += incremental_buy;
        self.liabilities.insert(buying.clone(), b);

        if !incremental_native.is_zero() {
            let mut n = self.asset_liabilities(&Asset::Native);
            n.selling += incremental_native;
            self.liabilities.insert(Asset::Native, n);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BalanceLine;
    use reef_core::Number;
    use rust_decimal_macros::dec;

    fn usd() -> Asset {
        Asset::credit("USD", "GISSUER")
    }

    fn eur() -> Asset {
        Asset::credit("EUR", "GISSUER")
    }

    fn offer(id: u64, selling: Asset, buying: Asset, price: &str, amount: &str) -> Offer {
        Offer {
            id,
            seller: "GME".to_string(),
            selling,
            buying,
            price: price.parse::<Number>().unwrap(),
            amount: amount.parse::<Number>().unwrap(),
        }
    }

    fn snapshot() -> AccountSnapshot {
        AccountSnapshot {
            account_id: "GME".to_string(),
            balances: vec![
                BalanceLine {
                    asset: Asset::Native,
                    balance: dec!(20),
                    limit: None,
                },
                BalanceLine {
                    asset: usd(),
                    balance: dec!(10),
                    limit: Some(dec!(100)),
                },
            ],
            subentry_count: 2,
            offers: vec![
                offer(1, Asset::Native, usd(), "0.2", "10"),
                offer(2, Asset::Native, eur(), "1", "5"),
            ],
        }
    }

    fn tracker() -> LiabilityTracker {
        let mut t = LiabilityTracker::new(LedgerParams {
            operational_buffer_non_native_pct: dec!(0.1),
            ..Default::default()
        });
        t.load_snapshot(snapshot());
        t
    }

    #[test]
    fn test_native_floor_counts_subentries() {
        let mut t = tracker();
        let b = t.asset_balance(&Asset::Native).unwrap();
        assert_eq!(b.floor, dec!(2.0));
        assert_eq!(b.trust, Decimal::MAX);
    }

    #[test]
    fn test_non_native_floor_is_buffer_pct() {
        let mut t = tracker();
        let b = t.asset_balance(&usd()).unwrap();
        assert_eq!(b.floor, dec!(1.0));
        assert_eq!(b.trust, dec!(100));
    }

    #[test]
    fn test_full_scan_on_cache_miss() {
        let mut t = tracker();
        assert_eq!(t.asset_liabilities(&Asset::Native).selling, dec!(15));
        assert_eq!(t.asset_liabilities(&usd()).buying, dec!(2.0));
        assert_eq!(t.asset_liabilities(&eur()).buying, dec!(5));
    }

    #[test]
    fn test_reset_excludes_pair_offers_only() {
        let mut t = tracker();
        t.reset_cached_liabilities(&Asset::Native, &usd());
        assert_eq!(t.asset_liabilities(&Asset::Native).selling, dec!(5));
        assert_eq!(t.asset_liabilities(&usd()).buying, Decimal::ZERO);
        assert_eq!(t.asset_liabilities(&eur()).buying, dec!(5));
    }

    #[test]
    fn test_available_capacity() {
        let mut t = tracker();
        t.reset_cached_liabilities(&Asset::Native, &usd());
        let native = t.available_capacity(&Asset::Native, dec!(0.5)).unwrap();
        // 20 - 2 floor - 5 liabilities - 0.5 incremental
        assert_eq!(native.selling, dec!(12.5));

        let usd_cap = t.available_capacity(&usd(), dec!(0.5)).unwrap();
        assert_eq!(usd_cap.selling, dec!(9.0));
        assert_eq!(usd_cap.buying, dec!(100));
    }

    #[test]
    fn test_oversell_and_overbuy_guards() {
        let mut t = tracker();
        t.reset_cached_liabilities(&Asset::Native, &usd());

        assert!(!t.will_oversell(&Asset::Native, dec!(13)).unwrap());
        assert!(t.will_oversell(&Asset::Native, dec!(13.01)).unwrap());

        assert!(!t.will_overbuy(&usd(), dec!(100)).unwrap());
        assert!(t.will_overbuy(&usd(), dec!(100.01)).unwrap());
        assert!(!t.will_overbuy(&Asset::Native, dec!(1000000)).unwrap());
    }

    #[test]
    fn test_add_liabilities_feeds_guards() {
        let mut t = tracker();
        t.reset_cached_liabilities(&Asset::Native, &usd());
        t.add_liabilities(&Asset::Native, &usd(), dec!(10), dec!(2), dec!(0.5));

        assert_eq!(t.asset_liabilities(&Asset::Native).selling, dec!(15.5));
        assert_eq!(t.asset_liabilities(&usd()).buying, dec!(2));
        assert!(t.will_oversell_native(dec!(2.6)).unwrap());
        assert!(!t.will_oversell_native(dec!(2.5)).unwrap());
    }

    #[test]
    fn test_missing_balance_line() {
        let mut t = tracker();
        assert!(matches!(
            t.asset_balance(&eur()),
            Err(LedgerError::BalanceNotFound(_))
        ));
    }
}
