//! Asset and trading pair identification.
//!
//! Assets are either the ledger's native reserve asset or a credit asset
//! identified by `CODE:ISSUER`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A tradable asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Asset {
    /// The ledger's reserve asset. Pays fees and backs the minimum reserve.
    Native,
    /// Issued credit asset.
    Credit { code: String, issuer: String },
}

impl Asset {
    pub fn credit(code: impl Into<String>, issuer: impl Into<String>) -> Self {
        Self::Credit {
            code: code.into(),
            issuer: issuer.into(),
        }
    }

    #[inline]
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    /// Short code used in logs ("native" for the reserve asset).
    pub fn code(&self) -> &str {
        match self {
            Self::Native => "native",
            Self::Credit { code, .. } => code,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "native"),
            Self::Credit { code, issuer } => write!(f, "{code}:{issuer}"),
        }
    }
}

impl FromStr for Asset {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("native") {
            return Ok(Self::Native);
        }
        match s.split_once(':') {
            Some((code, issuer)) if !code.is_empty() && !issuer.is_empty() => {
                Ok(Self::credit(code, issuer))
            }
            _ => Err(CoreError::InvalidAsset(s.to_string())),
        }
    }
}

impl TryFrom<String> for Asset {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Asset> for String {
    fn from(asset: Asset) -> Self {
        asset.to_string()
    }
}

/// Base/quote pair. Prices are quoted as quote units per base unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TradingPair {
    pub base: Asset,
    pub quote: Asset,
}

impl TradingPair {
    pub fn new(base: Asset, quote: Asset) -> Self {
        Self { base, quote }
    }

    /// The same market seen from the other side.
    pub fn inverted(&self) -> Self {
        Self {
            base: self.quote.clone(),
            quote: self.base.clone(),
        }
    }

    /// True if an offer selling `selling` for `buying` belongs to this pair.
    pub fn contains_offer(&self, selling: &Asset, buying: &Asset) -> bool {
        (selling == &self.base && buying == &self.quote)
            || (selling == &self.quote && buying == &self.base)
    }
}

impl fmt::Display for TradingPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base.code(), self.quote.code())
    }
}
