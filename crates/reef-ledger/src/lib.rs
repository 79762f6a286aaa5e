//! Ledger venue support for reef.
//!
//! - `LiabilityTracker`: committed exposure and capacity per asset
//! - `OfferBuilder`: guarded create/modify/delete operations
//! - `Sdex`: signed asynchronous submission with sequence management
//! - `PaperLedger`: in-memory ledger for paper trading and tests

pub mod builder;
pub mod client;
pub mod error;
pub mod liability;
pub mod paper;
pub mod params;
pub mod sdex;
pub mod sequence;
pub mod signer;

pub use builder::OfferBuilder;
pub use client::{AccountSnapshot, BalanceLine, LedgerBook, LedgerClient, SignedTransaction, Transaction};
pub use error::{LedgerError, LedgerResult, SubmitError};
pub use liability::{AssetBalance, Liabilities, LiabilityTracker};
pub use paper::PaperLedger;
pub use params::LedgerParams;
pub use sdex::{Sdex, SdexConfig, SubmitCallback, SubmitHandle, SubmitOutcome, MAX_OPS_PER_TRANSACTION};
pub use sequence::SequenceState;
pub use signer::{account_id, load_key, transaction_hash, KeyError, KeySource, SignerError, TxSigner};
