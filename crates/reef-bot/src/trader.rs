//! The update cycle.
//!
//! One cycle loads the trading account, lets the strategy turn its levels into
//! offer operations, runs them through the submit filters and hands them to
//! the submitter. A cycle either completes or fails as a whole; nothing is
//! submitted from a failed cycle. After too many failures in a row every offer
//! on the pair is deleted.

use std::sync::Arc;

use reef_core::{Asset, ManageOffer, Number, Offer, TradingPair, LEDGER_PRECISION};
use reef_filter::{apply_chain, SubmitFilter};
use reef_ledger::{
    AccountSnapshot, LedgerClient, LedgerError, OfferBuilder, Sdex, SubmitCallback, SubmitError,
    SubmitHandle,
};
use reef_strategy::Strategy;
use reef_telemetry::Metrics;
use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, AppResult};

/// Result of one call to [`Trader::update`].
#[derive(Debug)]
pub enum CycleOutcome {
    /// The cycle completed. `None` when there was nothing to submit.
    Completed(Option<SubmitHandle>),
    /// The cycle failed. `delete_all` is set when the failure triggered the
    /// removal of every offer on the pair.
    Failed {
        error: AppError,
        delete_all: Option<SubmitHandle>,
    },
}

impl CycleOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

pub struct Trader {
    pair: TradingPair,
    client: Arc<dyn LedgerClient>,
    strategy: Box<dyn Strategy>,
    builder: OfferBuilder,
    sdex: Sdex,
    filters: Vec<SubmitFilter>,
    delete_cycles_threshold: i64,
    consecutive_failures: i64,
}

impl Trader {
    pub fn new(
        pair: TradingPair,
        client: Arc<dyn LedgerClient>,
        strategy: Box<dyn Strategy>,
        builder: OfferBuilder,
        sdex: Sdex,
        filters: Vec<SubmitFilter>,
        delete_cycles_threshold: i64,
    ) -> Self {
        Self {
            pair,
            client,
            strategy,
            builder,
            sdex,
            filters,
            delete_cycles_threshold,
            consecutive_failures: 0,
        }
    }

    pub fn pair(&self) -> &TradingPair {
        &self.pair
    }

    pub fn trading_account(&self) -> &str {
        self.builder.trading_account()
    }

    pub fn consecutive_failures(&self) -> i64 {
        self.consecutive_failures
    }

    pub fn sdex(&self) -> &Sdex {
        &self.sdex
    }

    /// Run one cycle and account for its outcome.
    pub async fn update(&mut self) -> CycleOutcome {
        match self.run_cycle().await {
            Ok(handle) => {
                self.consecutive_failures = 0;
                Metrics::cycle_ok();
                CycleOutcome::Completed(handle)
            }
            Err(error) => {
                self.consecutive_failures += 1;
                Metrics::cycle_failed(self.consecutive_failures);
                error!(
                    pair = %self.pair,
                    error = %error,
                    consecutive_failures = self.consecutive_failures,
                    "Update cycle failed"
                );
                let delete_all = self.after_failure().await;
                CycleOutcome::Failed { error, delete_all }
            }
        }
    }

    async fn after_failure(&mut self) -> Option<SubmitHandle> {
        if self.delete_cycles_threshold < 0 {
            return None;
        }
        if self.consecutive_failures <= self.delete_cycles_threshold {
            info!(
                consecutive_failures = self.consecutive_failures,
                threshold = self.delete_cycles_threshold,
                "Keeping offers after failed cycle"
            );
            return None;
        }
        warn!(
            consecutive_failures = self.consecutive_failures,
            threshold = self.delete_cycles_threshold,
            "Too many failed cycles, deleting all offers"
        );
        match self.delete_all_offers().await {
            Ok(handle) => handle,
            Err(e) => {
                error!(error = %e, "Could not delete offers");
                None
            }
        }
    }

    /// Delete every offer of the trading account on this pair, unfiltered.
    pub async fn delete_all_offers(&mut self) -> AppResult<Option<SubmitHandle>> {
        let snapshot = self.client.load_account(self.builder.trading_account()).await?;
        let (selling, buying) = pair_offers(&snapshot, &self.pair);
        let ops: Vec<ManageOffer> = selling
            .iter()
            .chain(&buying)
            .map(|offer| self.builder.delete_offer(offer))
            .collect();
        info!(count = ops.len(), pair = %self.pair, "Deleting all offers");
        self.submit(ops).await
    }

    async fn run_cycle(&mut self) -> AppResult<Option<SubmitHandle>> {
        let snapshot = self.client.load_account(self.builder.trading_account()).await?;
        let (max_base, trust_base) = capacity(&snapshot, &self.pair.base)?;
        let (max_quote, trust_quote) = capacity(&snapshot, &self.pair.quote)?;
        let (selling_offers, buying_offers) = pair_offers(&snapshot, &self.pair);
        debug!(
            base = %max_base,
            quote = %max_quote,
            asks = selling_offers.len(),
            bids = buying_offers.len(),
            "Loaded account"
        );

        self.builder.reset_cycle(snapshot, &self.pair);
        self.strategy
            .pre_update(max_base, max_quote, trust_base, trust_quote)
            .await?;

        let (mut ops, buying, selling) = self.strategy.prune_existing_offers(
            buying_offers.clone(),
            selling_offers.clone(),
            &self.builder,
        );
        ops.extend(
            self.strategy
                .update_with_ops(&buying, &selling, &mut self.builder)?,
        );
        Metrics::capacity_refusals(self.builder.take_refusals());

        let ops = apply_chain(&self.filters, ops, &selling_offers, &buying_offers).await?;
        let handle = self.submit(ops).await?;
        self.strategy.post_update()?;
        Ok(handle)
    }

    async fn submit(&mut self, ops: Vec<ManageOffer>) -> AppResult<Option<SubmitHandle>> {
        if ops.is_empty() {
            debug!(pair = %self.pair, "Nothing to submit");
            return Ok(None);
        }
        for op in &ops {
            Metrics::op_submitted(op_kind(op));
        }
        let callback: SubmitCallback = Box::new(|result: Result<String, SubmitError>| {
            let outcome = match &result {
                Ok(hash) if hash.is_empty() => "simulated",
                Ok(_) => "accepted",
                Err(SubmitError::BadSequence) => "bad_sequence",
                Err(SubmitError::RateLimited) => "rate_limited",
                Err(SubmitError::Rejected(_)) => "rejected",
                Err(SubmitError::Transport(_)) => "transport",
            };
            Metrics::submit_outcome(outcome);
        });
        Ok(self.sdex.submit_ops(ops, Some(callback)).await?)
    }
}

fn op_kind(op: &ManageOffer) -> &'static str {
    if op.is_create() {
        "create"
    } else if op.is_delete() {
        "delete"
    } else {
        "modify"
    }
}

/// Balance and trust limit of `asset` at ledger precision.
///
/// The native asset has no trust line; its limit is treated as unbounded.
fn capacity(snapshot: &AccountSnapshot, asset: &Asset) -> AppResult<(Number, Number)> {
    let line = snapshot
        .balance_line(asset)
        .ok_or_else(|| LedgerError::BalanceNotFound(asset.to_string()))?;
    let limit = match line.limit {
        Some(limit) => limit,
        None if asset.is_native() => Decimal::from(i64::MAX),
        None => return Err(LedgerError::BalanceNotFound(format!("trust limit for {asset}")).into()),
    };
    Ok((
        Number::from_decimal(line.balance, LEDGER_PRECISION)?,
        Number::from_decimal(limit, LEDGER_PRECISION)?,
    ))
}

/// Offers of the pair, split into (selling base, selling quote).
fn pair_offers(snapshot: &AccountSnapshot, pair: &TradingPair) -> (Vec<Offer>, Vec<Offer>) {
    (
        snapshot.offers_for(&pair.base, &pair.quote),
        snapshot.offers_for(&pair.quote, &pair.base),
    )
}
