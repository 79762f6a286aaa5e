//! Ledger error types.

use reef_core::CoreError;
use thiserror::Error;

use crate::signer::{KeyError, SignerError};

/// Why the ledger refused or failed to take a transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubmitError {
    #[error("Bad sequence number")]
    BadSequence,

    #[error("Rate limited")]
    RateLimited,

    #[error("Transaction rejected: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("No balance line for asset {0}")]
    BalanceNotFound(String),

    #[error("Batch of {count} operations exceeds the limit of {max} per transaction")]
    TooManyOperations { count: usize, max: usize },

    #[error("Sequence number unavailable: {0}")]
    Sequence(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Signer(#[from] SignerError),

    #[error(transparent)]
    Key(#[from] KeyError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
