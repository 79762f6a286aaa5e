//! Submit filter pipeline.
//!
//! Filters run in order on the operations a strategy produced, right before
//! they are submitted. Deletes always survive; a dropped modify becomes a
//! delete of the same offer; a dropped create disappears.

pub mod constraints;
pub mod dedupe;
pub mod error;
pub mod filter;
pub mod maker;
pub mod ops;
pub mod price;
pub mod volume;

pub use constraints::ConstraintsFilter;
pub use dedupe::DedupeFilter;
pub use error::{FilterError, FilterResult};
pub use filter::{apply_chain, SubmitFilter};
pub use maker::MakerModeFilter;
pub use ops::{filter_ops, op_view, Action, MarketView, Verdict};
pub use price::PriceBoundsFilter;
pub use volume::{DailyVolumeFilter, VolumeMode};
