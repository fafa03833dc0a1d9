use crate::error::BotError;
use crate::indicators::price_series::{PriceSeries, DEFAULT_LONG_WINDOW, DEFAULT_SHORT_WINDOW};
use crate::models::{Candle, TradeSignal};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Configuration for trend signal generation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SignalConfig {
    pub short_window: usize,
    pub long_window: usize,
    /// Held assets are sold while short trend < long trend * (1 + sell_margin)
    pub sell_margin: f64,
    /// Buys need short trend > long trend * (1 + buy_margin)
    pub buy_margin: f64,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            short_window: DEFAULT_SHORT_WINDOW,
            long_window: DEFAULT_LONG_WINDOW,
            sell_margin: 0.05,
            buy_margin: 0.05,
        }
    }
}

impl SignalConfig {
    /// Bars needed before both trends are defined
    pub fn min_bars_required(&self) -> usize {
        self.short_window.max(self.long_window)
    }
}

/// Classifies a pair as sell candidate, buy candidate, or neutral.
///
/// Stateless: the same series and holding flag always give the same signal.
#[derive(Debug, Clone, Default)]
pub struct SignalEvaluator {
    config: SignalConfig,
}

impl SignalEvaluator {
    pub fn new(config: SignalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Build a series using this evaluator's windows
    pub fn series(&self, pair: &str, bars: Vec<Candle>) -> Result<PriceSeries> {
        PriceSeries::compute_trends(
            pair,
            bars,
            self.config.short_window,
            self.config.long_window,
        )
    }

    /// Decide what to do with one pair.
    ///
    /// `Buy` only means the trend qualifies; whether the pair is affordable is
    /// the allocator's call. Held assets never get `Buy`, and a held asset that
    /// meets both conditions (possible only with asymmetric margins) is `Neutral`.
    pub fn evaluate(&self, series: &PriceSeries, is_held: bool) -> Result<TradeSignal> {
        let short = series.short_trend();
        let long = series.long_trend();

        if !long.is_finite() || long == 0.0 || !short.is_finite() {
            return Err(BotError::InsufficientData {
                pair: series.pair().to_string(),
                available: series.bars().len(),
                required: self.config.min_bars_required(),
            });
        }

        let sell_condition = is_held && short < long * (1.0 + self.config.sell_margin);
        let buy_condition = short > long * (1.0 + self.config.buy_margin);

        let signal = match (sell_condition, buy_condition) {
            (true, true) => TradeSignal::Neutral,
            (true, false) => TradeSignal::Sell,
            (false, true) if !is_held => TradeSignal::Buy {
                price: series.last_close(),
            },
            _ => TradeSignal::Neutral,
        };

        tracing::debug!(
            pair = %series.pair(),
            short_trend = short,
            long_trend = long,
            is_held,
            ?signal,
            "Evaluated trend"
        );

        Ok(signal)
    }
}
