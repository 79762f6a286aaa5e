//! Ledger offer types.
//!
//! Offers are always expressed from the seller's point of view: `amount` is in
//! units of `selling` and `price` is units of `buying` per unit of `selling`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::Asset;
use crate::number::Number;

/// One desired price point produced by a level provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub price: Number,
    pub amount: Number,
}

impl Level {
    pub fn new(price: Number, amount: Number) -> Self {
        Self { price, amount }
    }
}

/// Live offer resting on the ledger order book.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: u64,
    pub seller: String,
    pub selling: Asset,
    pub buying: Asset,
    pub price: Number,
    pub amount: Number,
}

impl Offer {
    /// Units of `buying` this offer would receive if fully taken.
    pub fn buying_amount(&self) -> Number {
        self.amount.multiply(&self.price)
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offer[id={}, selling={} {}, price={} {}]",
            self.id,
            self.amount,
            self.selling.code(),
            self.price,
            self.buying.code()
        )
    }
}

/// Pending offer operation.
///
/// `offer_id == 0` creates a new offer, `amount == 0` deletes `offer_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManageOffer {
    pub offer_id: u64,
    pub selling: Asset,
    pub buying: Asset,
    pub price: Number,
    pub amount: Number,
    /// Account the operation runs as, if it differs from the transaction source.
    pub source_account: Option<String>,
}

impl ManageOffer {
    /// Delete operation for an existing offer.
    pub fn delete(offer: &Offer, source_account: Option<String>) -> Self {
        Self {
            offer_id: offer.id,
            selling: offer.selling.clone(),
            buying: offer.buying.clone(),
            price: offer.price,
            amount: Number::zero(),
            source_account,
        }
    }

    #[inline]
    pub fn is_delete(&self) -> bool {
        self.offer_id != 0 && self.amount.is_zero()
    }

    #[inline]
    pub fn is_create(&self) -> bool {
        self.offer_id == 0
    }

    #[inline]
    pub fn is_modify(&self) -> bool {
        self.offer_id != 0 && !self.amount.is_zero()
    }

    /// Turn this operation into a delete of the same offer.
    ///
    /// Returns `None` for creates, which have nothing to delete.
    pub fn to_delete(&self) -> Option<Self> {
        if self.is_create() {
            return None;
        }
        Some(Self {
            amount: Number::zero(),
            ..self.clone()
        })
    }

    /// True if the operation sells `selling` for `buying`.
    pub fn is_side(&self, selling: &Asset, buying: &Asset) -> bool {
        &self.selling == selling && &self.buying == buying
    }
}

impl fmt::Display for ManageOffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_create() {
            "create"
        } else if self.is_delete() {
            "delete"
        } else {
            "modify"
        };
        write!(
            f,
            "ManageOffer[{kind} id={}, selling={} {}, price={} {}]",
            self.offer_id,
            self.amount,
            self.selling.code(),
            self.price,
            self.buying.code()
        )
    }
}
