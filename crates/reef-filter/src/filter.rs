//! The submit filter pipeline.

use reef_core::{ManageOffer, Offer};
use tracing::debug;

use crate::constraints::ConstraintsFilter;
use crate::dedupe::DedupeFilter;
use crate::error::FilterResult;
use crate::maker::MakerModeFilter;
use crate::price::PriceBoundsFilter;
use crate::volume::DailyVolumeFilter;

/// One stage of the pipeline run right before submission.
pub enum SubmitFilter {
    OrderConstraints(ConstraintsFilter),
    PriceBounds(PriceBoundsFilter),
    DailyVolume(DailyVolumeFilter),
    MakerMode(MakerModeFilter),
    Dedupe(DedupeFilter),
}

impl SubmitFilter {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OrderConstraints(_) => "order_constraints",
            Self::PriceBounds(_) => "price_bounds",
            Self::DailyVolume(_) => "daily_volume",
            Self::MakerMode(_) => "maker_mode",
            Self::Dedupe(_) => "dedupe",
        }
    }

    pub async fn apply(
        &self,
        ops: Vec<ManageOffer>,
        selling_offers: &[Offer],
        buying_offers: &[Offer],
    ) -> FilterResult<Vec<ManageOffer>> {
        match self {
            Self::OrderConstraints(f) => f.apply(ops),
            Self::PriceBounds(f) => f.apply(ops),
            Self::DailyVolume(f) => f.apply(ops),
            Self::MakerMode(f) => f.apply(ops, selling_offers, buying_offers).await,
            Self::Dedupe(f) => Ok(f.apply(ops, selling_offers, buying_offers)),
        }
    }
}

/// Run `filters` in order. The first error aborts the chain.
pub async fn apply_chain(
    filters: &[SubmitFilter],
    mut ops: Vec<ManageOffer>,
    selling_offers: &[Offer],
    buying_offers: &[Offer],
) -> FilterResult<Vec<ManageOffer>> {
    for filter in filters {
        let before = ops.len();
        ops = filter.apply(ops, selling_offers, buying_offers).await?;
        debug!(filter = filter.name(), before, after = ops.len(), "Filter applied");
    }
    Ok(ops)
}
