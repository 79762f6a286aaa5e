//! Account sequence number tracking.
//!
//! Every transaction consumes exactly one sequence number. When the ledger
//! reports a bad sequence, or the outcome of a submission is unknown, the local
//! value can no longer be trusted and must be reloaded before the next build.

/// Local view of the source account's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceState {
    /// Never loaded.
    #[default]
    Uninitialized,
    /// Last sequence number used (or loaded from the ledger).
    Loaded(i64),
    /// The ledger rejected a transaction built after this value.
    Stale(i64),
    /// Reload requested without a known last value.
    ReloadPending,
}

impl SequenceState {
    #[must_use]
    pub fn needs_reload(&self) -> bool {
        !matches!(self, Self::Loaded(_))
    }

    /// Replace local state with the ledger's current sequence number.
    pub fn load(&mut self, sequence: i64) {
        *self = Self::Loaded(sequence);
    }

    /// Take the next sequence number for a transaction.
    ///
    /// Returns `None` if the state must be reloaded first.
    pub fn next(&mut self) -> Option<i64> {
        match *self {
            Self::Loaded(n) => {
                let next = n.saturating_add(1);
                *self = Self::Loaded(next);
                Some(next)
            }
            _ => None,
        }
    }

    pub fn mark_stale(&mut self) {
        if let Self::Loaded(n) = *self {
            *self = Self::Stale(n);
        }
    }

    pub fn request_reload(&mut self) {
        *self = Self::ReloadPending;
    }

    #[must_use]
    pub fn current(&self) -> Option<i64> {
        match *self {
            Self::Loaded(n) | Self::Stale(n) => Some(n),
            _ => None,
        }
    }
}
