use crate::error::BotError;
use crate::execution::{AllocationConfig, ExecutionConfig};
use crate::models::{MinOrderSizeTable, TradingPair};
use crate::strategy::SignalConfig;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const ENV_PREFIX: &str = "TRENDROTOR";

/// One entry of the traded pair list
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PairEntry {
    pub symbol: String,
    #[serde(default)]
    pub base: Option<String>,
    #[serde(default)]
    pub min_order: Option<f64>,
}

/// Bot configuration: built-in defaults, then an optional TOML file, then
/// `TRENDROTOR__*` environment variables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub api_url: String,
    pub quote_asset: String,
    pub quote_suffix: String,
    pub ohlc_interval_minutes: u32,
    pub cycle_interval_secs: u64,
    pub settlement_delay_secs: u64,
    /// Aborted cycles in a row before the loop gives up
    pub max_consecutive_failures: u32,
    pub dry_run: bool,
    pub signal: SignalConfig,
    pub allocation: AllocationConfig,
    pub pairs: Vec<PairEntry>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.kraken.com".to_string(),
            quote_asset: "ZUSD".to_string(),
            quote_suffix: "USD".to_string(),
            ohlc_interval_minutes: 5,
            cycle_interval_secs: 300,
            settlement_delay_secs: 30,
            max_consecutive_failures: 5,
            dry_run: false,
            signal: SignalConfig::default(),
            allocation: AllocationConfig::default(),
            pairs: Vec::new(),
        }
    }
}

impl BotConfig {
    /// Load from a TOML file (skipped if missing) and the environment
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!("Config file {} not found, using defaults", path.display());
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from TOML text without touching the environment
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(BotError::Config(msg));

        if self.pairs.is_empty() {
            return fail("no pairs configured".to_string());
        }
        if self.quote_asset.is_empty() {
            return fail("quote_asset is empty".to_string());
        }
        if self.ohlc_interval_minutes == 0 {
            return fail("ohlc_interval_minutes must be positive".to_string());
        }
        if self.signal.short_window == 0 {
            return fail("signal.short_window must be positive".to_string());
        }
        if self.signal.short_window > self.signal.long_window {
            return fail(format!(
                "signal.short_window ({}) exceeds long_window ({})",
                self.signal.short_window, self.signal.long_window
            ));
        }
        if self.signal.sell_margin < 0.0 || self.signal.buy_margin < 0.0 {
            return fail("signal margins must not be negative".to_string());
        }
        if self.allocation.slots == 0 {
            return fail("allocation.slots must be positive".to_string());
        }
        if !(self.allocation.fee_buffer > 0.0 && self.allocation.fee_buffer <= 1.0) {
            return fail(format!(
                "allocation.fee_buffer must be in (0, 1], got {}",
                self.allocation.fee_buffer
            ));
        }
        for entry in &self.pairs {
            if let Some(min) = entry.min_order {
                if !(min.is_finite() && min > 0.0) {
                    return fail(format!("{}: min_order must be positive", entry.symbol));
                }
            }
        }

        Ok(())
    }

    /// Resolved pairs in configured order
    pub fn trading_pairs(&self) -> Vec<TradingPair> {
        self.pairs
            .iter()
            .map(|entry| TradingPair {
                symbol: entry.symbol.clone(),
                base: entry
                    .base
                    .clone()
                    .unwrap_or_else(|| derive_base(&entry.symbol, &self.quote_suffix)),
                min_order: entry
                    .min_order
                    .unwrap_or(crate::models::DEFAULT_MIN_ORDER_SIZE),
            })
            .collect()
    }

    pub fn min_order_table(&self) -> MinOrderSizeTable {
        MinOrderSizeTable::from_pairs(&self.trading_pairs())
    }

    pub fn execution_config(&self) -> ExecutionConfig {
        ExecutionConfig {
            quote_asset: self.quote_asset.clone(),
            ohlc_interval_minutes: self.ohlc_interval_minutes,
            settlement_delay: Duration::from_secs(self.settlement_delay_secs),
            fee_buffer: self.allocation.fee_buffer,
        }
    }

    pub fn cycle_interval(&self) -> Duration {
        Duration::from_secs(self.cycle_interval_secs)
    }
}

/// Balance asset code for a pair symbol.
///
/// Four-letter codes joined to a `Z`-prefixed quote such as `XXBTZUSD` or
/// `USDTZUSD` carry the asset code directly (`XXBT`, `USDT`); everything else
/// drops the quote suffix (`ADAUSD` -> `ADA`).
pub fn derive_base(symbol: &str, quote_suffix: &str) -> String {
    let legacy_quote = format!("Z{}", quote_suffix);
    if symbol.len() == 4 + legacy_quote.len() && symbol.ends_with(&legacy_quote) {
        if let Some(code) = symbol.get(..4) {
            return code.to_string();
        }
    }

    symbol
        .strip_suffix(quote_suffix)
        .filter(|base| !base.is_empty())
        .unwrap_or(symbol)
        .to_string()
}
