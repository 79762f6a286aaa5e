//! Drops modifies that would leave an offer exactly as it is.

use reef_core::{ManageOffer, Offer};
use reef_telemetry::Metrics;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct DedupeFilter;

impl DedupeFilter {
    pub fn apply(
        &self,
        ops: Vec<ManageOffer>,
        selling_offers: &[Offer],
        buying_offers: &[Offer],
    ) -> Vec<ManageOffer> {
        ops.into_iter()
            .filter(|op| {
                if !op.is_modify() {
                    return true;
                }
                let resting = selling_offers
                    .iter()
                    .chain(buying_offers)
                    .find(|o| o.id == op.offer_id);
                let duplicate = resting.is_some_and(|o| {
                    o.selling == op.selling
                        && o.buying == op.buying
                        && o.price.value() == op.price.value()
                        && o.amount.value() == op.amount.value()
                });
                if duplicate {
                    debug!(op = %op, "Modify matches resting offer, dropping");
                    Metrics::filter_action("dedupe", "dropped");
                }
                !duplicate
            })
            .collect()
    }
}
