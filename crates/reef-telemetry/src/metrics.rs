//! Prometheus metrics for the reef trader.
//!
//! Registration uses `unwrap()`: a failure means duplicate metric names, a
//! startup bug that should crash immediately. It only runs during static
//! initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_int_counter, register_int_gauge, CounterVec, Encoder,
    IntCounter, IntGauge, TextEncoder,
};

use crate::error::TelemetryResult;

/// Completed update cycles.
/// Labels: outcome (ok/error)
pub static CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("reef_cycles_total", "Update cycles run", &["outcome"]).unwrap()
});

/// Consecutive failed cycles since the last success.
pub static CONSECUTIVE_FAILURES: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "reef_consecutive_failed_cycles",
        "Consecutive failed update cycles"
    )
    .unwrap()
});

/// Offer operations handed to the submitter.
/// Labels: kind (create/modify/delete)
pub static OPS_SUBMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reef_ops_submitted_total",
        "Offer operations submitted",
        &["kind"]
    )
    .unwrap()
});

/// Operations removed or rewritten by a submit filter.
/// Labels: filter, action (dropped/deleted/shrunk)
pub static FILTER_ACTIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reef_filter_actions_total",
        "Operations dropped, converted to deletes or shrunk by submit filters",
        &["filter", "action"]
    )
    .unwrap()
});

/// Outcome of submitted transactions.
/// Labels: outcome (accepted/simulated/bad_sequence/rate_limited/rejected/transport)
pub static SUBMIT_OUTCOMES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "reef_submit_outcomes_total",
        "Transaction submission outcomes",
        &["outcome"]
    )
    .unwrap()
});

/// Offers refused by the capacity guards.
pub static CAPACITY_REFUSALS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "reef_capacity_refusals_total",
        "Offer operations refused for lack of balance, trust or reserve"
    )
    .unwrap()
});

/// Fills observed by the fill tracker.
/// Labels: side (buy/sell)
pub static FILLS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!("reef_fills_total", "Fills observed", &["side"]).unwrap()
});

/// Metrics helper.
pub struct Metrics;

impl Metrics {
    pub fn cycle_ok() {
        CYCLES_TOTAL.with_label_values(&["ok"]).inc();
        CONSECUTIVE_FAILURES.set(0);
    }

    pub fn cycle_failed(consecutive: i64) {
        CYCLES_TOTAL.with_label_values(&["error"]).inc();
        CONSECUTIVE_FAILURES.set(consecutive);
    }

    pub fn op_submitted(kind: &str) {
        OPS_SUBMITTED_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn filter_action(filter: &str, action: &str) {
        FILTER_ACTIONS_TOTAL.with_label_values(&[filter, action]).inc();
    }

    pub fn submit_outcome(outcome: &str) {
        SUBMIT_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
    }

    pub fn capacity_refusals(count: u64) {
        CAPACITY_REFUSALS_TOTAL.inc_by(count);
    }

    pub fn fill(side: &str) {
        FILLS_TOTAL.with_label_values(&[side]).inc();
    }

    /// Everything registered in the default registry, in text exposition format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
