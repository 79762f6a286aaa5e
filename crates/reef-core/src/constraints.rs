//! Order precision and minimum volume rules for one market.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::number::Number;

/// Price/volume precision of the ledger's order book.
pub const LEDGER_PRECISION: u32 = 7;

/// Precision and minimum volume rules for a trading pair on one venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderConstraints {
    /// Digits after the point allowed in prices.
    pub price_precision: u32,
    /// Digits after the point allowed in base volumes.
    pub volume_precision: u32,
    /// Smallest base volume an order may carry.
    pub min_base_volume: Number,
    /// Smallest quote volume an order may carry, if the venue has one.
    pub min_quote_volume: Option<Number>,
}

impl OrderConstraints {
    pub fn new(
        price_precision: u32,
        volume_precision: u32,
        min_base_volume: Number,
        min_quote_volume: Option<Number>,
    ) -> Self {
        Self {
            price_precision,
            volume_precision,
            min_base_volume,
            min_quote_volume,
        }
    }

    /// Constraints of the ledger order book: 7 digits, one stroop minimum.
    pub fn ledger() -> Self {
        Self {
            price_precision: LEDGER_PRECISION,
            volume_precision: LEDGER_PRECISION,
            min_base_volume: Number::from_decimal(Decimal::new(1, LEDGER_PRECISION), LEDGER_PRECISION)
                .unwrap_or_else(|_| Number::zero()),
            min_quote_volume: None,
        }
    }

    /// Copy of these constraints with every set field of `over` replacing ours.
    pub fn with_override(&self, over: &OrderConstraintsOverride) -> Self {
        Self {
            price_precision: over.price_precision.unwrap_or(self.price_precision),
            volume_precision: over.volume_precision.unwrap_or(self.volume_precision),
            min_base_volume: over.min_base_volume.unwrap_or(self.min_base_volume),
            min_quote_volume: over.min_quote_volume.unwrap_or(self.min_quote_volume),
        }
    }

    /// Synthesize constraints from an override alone.
    ///
    /// # Errors
    /// `IncompleteOverride` if any field of the override is unset.
    pub fn from_override(over: &OrderConstraintsOverride) -> Result<Self> {
        match (
            over.price_precision,
            over.volume_precision,
            over.min_base_volume,
            over.min_quote_volume,
        ) {
            (Some(price_precision), Some(volume_precision), Some(min_base_volume), Some(min_quote)) => {
                Ok(Self::new(price_precision, volume_precision, min_base_volume, min_quote))
            }
            _ => Err(CoreError::IncompleteOverride(over.to_string())),
        }
    }

    /// True if an order of `base` units worth `quote` units is too small to place.
    pub fn is_below_minimum(&self, base: &Number, quote: &Number) -> bool {
        if base.value() < self.min_base_volume.value() {
            return true;
        }
        matches!(&self.min_quote_volume, Some(min) if quote.value() < min.value())
    }
}

impl fmt::Display for OrderConstraints {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let min_quote = self
            .min_quote_volume
            .map(|n| n.as_string())
            .unwrap_or_else(|| "none".to_string());
        write!(
            f,
            "OrderConstraints[price_precision: {}, volume_precision: {}, min_base_volume: {}, min_quote_volume: {}]",
            self.price_precision, self.volume_precision, self.min_base_volume, min_quote
        )
    }
}

/// Partial replacement for `OrderConstraints`; unset fields fall back to defaults.
///
/// `min_quote_volume` is doubly optional: `Some(None)` explicitly removes the
/// quote minimum, `None` leaves the default in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderConstraintsOverride {
    #[serde(default)]
    pub price_precision: Option<u32>,
    #[serde(default)]
    pub volume_precision: Option<u32>,
    #[serde(default)]
    pub min_base_volume: Option<Number>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub min_quote_volume: Option<Option<Number>>,
}

impl OrderConstraintsOverride {
    /// True if every field is set, so full constraints can be built from it.
    pub fn is_complete(&self) -> bool {
        self.price_precision.is_some()
            && self.volume_precision.is_some()
            && self.min_base_volume.is_some()
            && self.min_quote_volume.is_some()
    }

    /// Take every field that `other` sets.
    pub fn augment(&mut self, other: &OrderConstraintsOverride) {
        if other.price_precision.is_some() {
            self.price_precision = other.price_precision;
        }
        if other.volume_precision.is_some() {
            self.volume_precision = other.volume_precision;
        }
        if other.min_base_volume.is_some() {
            self.min_base_volume = other.min_base_volume;
        }
        if other.min_quote_volume.is_some() {
            self.min_quote_volume = other.min_quote_volume;
        }
    }
}

impl fmt::Display for OrderConstraintsOverride {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn show<T: fmt::Display>(v: &Option<T>) -> String {
            v.as_ref()
                .map(|x| x.to_string())
                .unwrap_or_else(|| "<unset>".to_string())
        }
        let min_quote = match &self.min_quote_volume {
            None => "<unset>".to_string(),
            Some(None) => "none".to_string(),
            Some(Some(n)) => n.to_string(),
        };
        write!(
            f,
            "OrderConstraintsOverride[price_precision: {}, volume_precision: {}, min_base_volume: {}, min_quote_volume: {}]",
            show(&self.price_precision),
            show(&self.volume_precision),
            show(&self.min_base_volume),
            min_quote
        )
    }
}

/// Distinguishes a missing key from an explicit `"none"` for the quote minimum.
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::number::Number;

    pub fn serialize<S: Serializer>(
        value: &Option<Option<Number>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        // unset values are skipped by the field attribute
        match value {
            None | Some(None) => "none".serialize(serializer),
            Some(Some(n)) => n.serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Option<Number>>, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Value(Number),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Text(s) if s.eq_ignore_ascii_case("none") => Ok(Some(None)),
            Raw::Text(s) => s
                .parse::<Number>()
                .map(|n| Some(Some(n)))
                .map_err(serde::de::Error::custom),
            Raw::Value(n) => Ok(Some(Some(n))),
        }
    }
}
