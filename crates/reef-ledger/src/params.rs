//! Fee and reserve parameters of the ledger.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerParams {
    /// Native units locked per account subentry (and twice for the account itself).
    #[serde(default = "default_base_reserve")]
    pub base_reserve: Decimal,
    /// Native units charged per operation.
    #[serde(default = "default_base_fee")]
    pub base_fee: Decimal,
    /// Native balance kept untouched on top of the reserve.
    #[serde(default)]
    pub operational_buffer: Decimal,
    /// Fraction of each non-native balance that is never offered.
    #[serde(default)]
    pub operational_buffer_non_native_pct: Decimal,
}

fn default_base_reserve() -> Decimal {
    dec!(0.5)
}

fn default_base_fee() -> Decimal {
    dec!(0.00001)
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            base_reserve: default_base_reserve(),
            base_fee: default_base_fee(),
            operational_buffer: Decimal::ZERO,
            operational_buffer_non_native_pct: Decimal::ZERO,
        }
    }
}

impl LedgerParams {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.base_reserve.is_sign_negative() || self.base_fee.is_sign_negative() {
            return Err(LedgerError::InvalidConfig(
                "base_reserve and base_fee must not be negative".to_string(),
            ));
        }
        if self.operational_buffer.is_sign_negative() {
            return Err(LedgerError::InvalidConfig(
                "operational_buffer must not be negative".to_string(),
            ));
        }
        if self.operational_buffer_non_native_pct < Decimal::ZERO
            || self.operational_buffer_non_native_pct >= Decimal::ONE
        {
            return Err(LedgerError::InvalidConfig(format!(
                "operational_buffer_non_native_pct must be in [0, 1), got {}",
                self.operational_buffer_non_native_pct
            )));
        }
        Ok(())
    }
}
