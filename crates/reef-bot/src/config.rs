//! Application configuration.

use std::path::{Path, PathBuf};

use reef_core::{Asset, Level, Number, OrderConstraintsOverride, TradingPair};
use reef_filter::{Action, VolumeMode};
use reef_ledger::{KeySource, LedgerParams, SdexConfig};
use reef_strategy::validate_levels;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// What the trader does with its offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyMode {
    /// Quote the configured levels.
    #[default]
    Levels,
    /// Delete every offer on the pair and place nothing.
    Delete,
}

/// Where a signing key is read from. Exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeyConfig {
    #[serde(default)]
    pub env: Option<String>,
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl KeyConfig {
    pub fn to_source(&self) -> AppResult<KeySource> {
        match (&self.env, &self.file) {
            (Some(var_name), None) => Ok(KeySource::EnvVar {
                var_name: var_name.clone(),
            }),
            (None, Some(path)) => Ok(KeySource::File { path: path.clone() }),
            _ => Err(AppError::Config(
                "key config needs exactly one of `env` or `file`".to_string(),
            )),
        }
    }
}

/// Levels and tolerances for one side of the book.
///
/// Sell levels are (quote per base, base amount), ascending. Buy levels are
/// written the same way, as bids, descending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideConfig {
    #[serde(default)]
    pub levels: Vec<Level>,
    #[serde(default = "default_tolerance")]
    pub price_tolerance: Decimal,
    #[serde(default = "default_tolerance")]
    pub amount_tolerance: Decimal,
    /// Level amounts are in the buying asset and get divided by the price.
    #[serde(default)]
    pub divide_amount_by_price: bool,
}

fn default_tolerance() -> Decimal {
    dec!(0.001)
}

impl Default for SideConfig {
    fn default() -> Self {
        Self {
            levels: Vec::new(),
            price_tolerance: default_tolerance(),
            amount_tolerance: default_tolerance(),
            divide_amount_by_price: false,
        }
    }
}

impl SideConfig {
    fn validate(&self, side: &str) -> AppResult<()> {
        for (label, value) in [
            ("price_tolerance", self.price_tolerance),
            ("amount_tolerance", self.amount_tolerance),
        ] {
            if value < Decimal::ZERO || value >= Decimal::ONE {
                return Err(AppError::Config(format!(
                    "{side}.{label} must be in [0, 1), got {value}"
                )));
            }
        }
        if let Some(level) = self
            .levels
            .iter()
            .find(|l| !l.price.is_positive() || l.amount.is_negative())
        {
            return Err(AppError::Config(format!(
                "{side} level needs a positive price and non-negative amount, got {} @ {}",
                level.amount, level.price
            )));
        }
        Ok(())
    }
}

/// One stage of the submit filter pipeline, in the order listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FilterConfig {
    OrderConstraints {
        #[serde(default)]
        overrides: OrderConstraintsOverride,
    },
    PriceBounds {
        #[serde(default)]
        min_price: Option<Decimal>,
        #[serde(default)]
        max_price: Option<Decimal>,
    },
    DailyVolume {
        action: Action,
        #[serde(default)]
        base_cap: Option<Decimal>,
        #[serde(default)]
        quote_cap: Option<Decimal>,
        #[serde(default = "default_volume_mode")]
        mode: VolumeMode,
    },
    MakerMode,
    Dedupe,
}

fn default_volume_mode() -> VolumeMode {
    VolumeMode::Exact
}

/// Starting balance of the paper account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperBalance {
    pub asset: Asset,
    pub balance: Decimal,
    /// Trust limit; ignored for the native asset.
    #[serde(default)]
    pub limit: Option<Decimal>,
}

/// Offer placed by some other account before the trader starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperOffer {
    pub seller: String,
    pub selling: Asset,
    pub buying: Asset,
    pub price: Number,
    pub amount: Number,
}

/// In-memory ledger seeded at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperConfig {
    #[serde(default)]
    pub sequence: i64,
    #[serde(default)]
    pub balances: Vec<PaperBalance>,
    #[serde(default)]
    pub resting_offers: Vec<PaperOffer>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub base: Asset,
    pub quote: Asset,
    #[serde(default)]
    pub mode: StrategyMode,
    /// Update cycle period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Upper bound of the random delay added to each tick.
    #[serde(default)]
    pub max_tick_delay_ms: u64,
    /// Consecutive failed cycles tolerated before all offers are deleted.
    /// Negative disables the delete.
    #[serde(default)]
    pub delete_cycles_threshold: i64,
    #[serde(default = "default_fill_interval_ms")]
    pub fill_tracker_interval_ms: u64,
    #[serde(default = "default_network_id")]
    pub network_id: String,
    pub source_key: KeyConfig,
    /// Separate trading account; the source key trades for itself when unset.
    #[serde(default)]
    pub trading_key: Option<KeyConfig>,
    #[serde(default)]
    pub ledger: LedgerParams,
    #[serde(default)]
    pub sdex: SdexConfig,
    #[serde(default)]
    pub sell: SideConfig,
    #[serde(default)]
    pub buy: SideConfig,
    #[serde(default)]
    pub filters: Vec<FilterConfig>,
    #[serde(default)]
    pub paper: PaperConfig,
}

fn default_tick_interval_ms() -> u64 {
    5_000
}

fn default_fill_interval_ms() -> u64 {
    5_000
}

fn default_network_id() -> String {
    "reef paper network".to_string()
}

impl AppConfig {
    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> AppResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn pair(&self) -> TradingPair {
        TradingPair::new(self.base.clone(), self.quote.clone())
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.base == self.quote {
            return Err(AppError::Config(format!(
                "base and quote must differ, both are {}",
                self.base
            )));
        }
        if self.tick_interval_ms == 0 || self.fill_tracker_interval_ms == 0 {
            return Err(AppError::Config(
                "tick_interval_ms and fill_tracker_interval_ms must be positive".to_string(),
            ));
        }
        if self.sdex.max_ops_per_transaction == 0 {
            return Err(AppError::Config(
                "sdex.max_ops_per_transaction must be positive".to_string(),
            ));
        }
        self.source_key.to_source()?;
        if let Some(trading) = &self.trading_key {
            trading.to_source()?;
        }
        self.ledger.validate()?;
        self.sell.validate("sell")?;
        self.buy.validate("buy")?;
        validate_levels(&self.sell.levels)?;
        // bids descend, so reversed they must ascend
        let bids: Vec<Level> = self.buy.levels.iter().rev().copied().collect();
        validate_levels(&bids)?;
        for filter in &self.filters {
            if let FilterConfig::DailyVolume {
                base_cap: None,
                quote_cap: None,
                ..
            } = filter
            {
                return Err(AppError::Config(
                    "daily_volume filter needs base_cap or quote_cap".to_string(),
                ));
            }
        }
        Ok(())
    }
}
