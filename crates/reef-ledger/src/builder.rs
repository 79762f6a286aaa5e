//! Guarded construction of offer operations.
//!
//! Every create or modify is checked against the liability tracker before it
//! is emitted. A refused operation is not an error: the builder logs the exact
//! figures and returns `Ok(None)` so the cycle carries on with the rest.

use reef_core::{Asset, ManageOffer, Number, Offer, OrderConstraints, TradingPair};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::client::AccountSnapshot;
use crate::error::LedgerResult;
use crate::liability::LiabilityTracker;
use crate::params::LedgerParams;

pub struct OfferBuilder {
    tracker: LiabilityTracker,
    source_account: String,
    trading_account: String,
    constraints: OrderConstraints,
    exposure: Option<Decimal>,
    refusals: u64,
}

impl OfferBuilder {
    pub fn new(
        params: LedgerParams,
        source_account: impl Into<String>,
        trading_account: impl Into<String>,
    ) -> Self {
        Self {
            tracker: LiabilityTracker::new(params),
            source_account: source_account.into(),
            trading_account: trading_account.into(),
            constraints: OrderConstraints::ledger(),
            exposure: None,
            refusals: 0,
        }
    }

    pub fn tracker(&self) -> &LiabilityTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut LiabilityTracker {
        &mut self.tracker
    }

    pub fn constraints(&self) -> &OrderConstraints {
        &self.constraints
    }

    pub fn source_account(&self) -> &str {
        &self.source_account
    }

    pub fn trading_account(&self) -> &str {
        &self.trading_account
    }

    /// Start a new cycle from a fresh snapshot.
    pub fn reset_cycle(&mut self, snapshot: AccountSnapshot, pair: &TradingPair) {
        self.tracker.load_snapshot(snapshot);
        self.tracker.reset_cached_liabilities(&pair.base, &pair.quote);
        self.exposure = None;
        self.refusals = 0;
    }

    /// Number of operations refused since the last call.
    pub fn take_refusals(&mut self) -> u64 {
        std::mem::take(&mut self.refusals)
    }

    /// Native cost of one more operation: the base fee when the trading account
    /// pays for the transaction, plus one base reserve for a new offer.
    pub fn incremental_native_amount(&self, is_new_offer: bool) -> Decimal {
        let params = self.tracker.params();
        let mut amount = Decimal::ZERO;
        if self.source_account == self.trading_account {
            amount += params.base_fee;
        }
        if is_new_offer {
            amount += params.base_reserve;
        }
        amount
    }

    fn op_source(&self) -> Option<String> {
        (self.source_account != self.trading_account).then(|| self.trading_account.clone())
    }

    pub fn create_sell_offer(
        &mut self,
        selling: &Asset,
        buying: &Asset,
        price: &Number,
        amount: &Number,
    ) -> LedgerResult<Option<ManageOffer>> {
        self.build(0, selling, buying, price, amount)
    }

    pub fn modify_sell_offer(
        &mut self,
        offer: &Offer,
        price: &Number,
        amount: &Number,
    ) -> LedgerResult<Option<ManageOffer>> {
        self.build(offer.id, &offer.selling, &offer.buying, price, amount)
    }

    pub fn delete_offer(&self, offer: &Offer) -> ManageOffer {
        ManageOffer::delete(offer, self.op_source())
    }

    /// Count a resting offer that stays untouched this cycle.
    pub fn keep_offer(&mut self, offer: &Offer) {
        let sell = offer.amount.value();
        let buy = sell * offer.price.value();
        self.tracker
            .add_liabilities(&offer.selling, &offer.buying, sell, buy, Decimal::ZERO);
        if offer.selling.is_native() {
            if let Some(exposure) = self.exposure.as_mut() {
                *exposure += sell;
            }
        }
    }

    fn native_exposure(&mut self) -> Decimal {
        match self.exposure {
            Some(e) => e,
            None => {
                let e = self.tracker.asset_liabilities(&Asset::Native).selling;
                self.exposure = Some(e);
                e
            }
        }
    }

    fn refuse(&mut self, offer_id: u64, reason: &str) -> Option<ManageOffer> {
        self.refusals += 1;
        debug!(offer_id, reason, "Offer operation refused");
        None
    }

    fn build(
        &mut self,
        offer_id: u64,
        selling: &Asset,
        buying: &Asset,
        price: &Number,
        amount: &Number,
    ) -> LedgerResult<Option<ManageOffer>> {
        let price = price.rescale(self.constraints.price_precision)?;
        let amount = amount.rescale_truncate(self.constraints.volume_precision)?;
        if !price.is_positive() || !amount.is_positive() {
            debug!(offer_id, %price, %amount, "Nothing to offer after rounding");
            return Ok(None);
        }

        let is_new = offer_id == 0;
        let incremental_sell = amount.value();
        let incremental_buy = amount.value() * price.value();
        let incremental_native = self.incremental_native_amount(is_new);

        if self.tracker.will_oversell(selling, incremental_sell)? {
            return Ok(self.refuse(offer_id, "oversell"));
        }
        if self.tracker.will_overbuy(buying, incremental_buy)? {
            return Ok(self.refuse(offer_id, "overbuy"));
        }
        // a native sell spends its amount on top of the fee and reserve
        let native_out = if selling.is_native() {
            incremental_native + incremental_sell
        } else {
            incremental_native
        };
        if self.tracker.will_oversell_native(native_out)? {
            return Ok(self.refuse(offer_id, "native fee and reserve"));
        }

        let native_balance = self.tracker.asset_balance(&Asset::Native)?.balance;
        let exposure = self.native_exposure();
        let buffer = self.tracker.params().operational_buffer;
        if native_balance - exposure - native_out < buffer {
            warn!(
                offer_id,
                native_balance = %native_balance,
                exposure = %exposure,
                incremental = %native_out,
                operational_buffer = %buffer,
                "Native balance would drop below the operational buffer"
            );
            return Ok(self.refuse(offer_id, "operational buffer"));
        }

        self.tracker.add_liabilities(
            selling,
            buying,
            incremental_sell,
            incremental_buy,
            incremental_native,
        );
        self.exposure = Some(exposure + native_out);

        Ok(Some(ManageOffer {
            offer_id,
            selling: selling.clone(),
            buying: buying.clone(),
            price,
            amount,
            source_account: self.op_source(),
        }))
    }
}
