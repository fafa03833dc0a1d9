use super::moving_average::calculate_sma;
use crate::error::BotError;
use crate::models::Candle;
use crate::Result;

pub const DEFAULT_SHORT_WINDOW: usize = 12;
pub const DEFAULT_LONG_WINDOW: usize = 26;

/// Normalized bar series for one pair with its short and long trend averages.
///
/// Lives for one cycle: built from a fresh fetch, evaluated, dropped.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    pair: String,
    bars: Vec<Candle>,
    short_trend: f64,
    long_trend: f64,
}

impl PriceSeries {
    /// Build a series and compute both trends over the trailing windows
    ///
    /// # Errors
    /// * `InsufficientData` - fewer bars than the longer window
    /// * `InvalidSeries` - bars out of time order, or a close that is not a
    ///   positive finite number
    pub fn compute_trends(
        pair: &str,
        bars: Vec<Candle>,
        short_window: usize,
        long_window: usize,
    ) -> Result<Self> {
        let required = short_window.max(long_window);
        if bars.len() < required || required == 0 {
            return Err(BotError::InsufficientData {
                pair: pair.to_string(),
                available: bars.len(),
                required,
            });
        }

        if let Some(window) = bars
            .windows(2)
            .find(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(BotError::InvalidSeries {
                pair: pair.to_string(),
                reason: format!(
                    "bars not in ascending time order ({} then {})",
                    window[0].timestamp, window[1].timestamp
                ),
            });
        }

        if let Some(bad) = bars.iter().find(|b| !b.close.is_finite() || b.close <= 0.0) {
            return Err(BotError::InvalidSeries {
                pair: pair.to_string(),
                reason: format!("close {} at {} is not a positive price", bad.close, bad.timestamp),
            });
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let insufficient = || BotError::InsufficientData {
            pair: pair.to_string(),
            available: closes.len(),
            required,
        };
        let short_trend = calculate_sma(&closes, short_window).ok_or_else(insufficient)?;
        let long_trend = calculate_sma(&closes, long_window).ok_or_else(insufficient)?;

        Ok(Self {
            pair: pair.to_string(),
            bars,
            short_trend,
            long_trend,
        })
    }

    /// Same as `compute_trends` with the 12/26 defaults
    pub fn with_default_windows(pair: &str, bars: Vec<Candle>) -> Result<Self> {
        Self::compute_trends(pair, bars, DEFAULT_SHORT_WINDOW, DEFAULT_LONG_WINDOW)
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn bars(&self) -> &[Candle] {
        &self.bars
    }

    pub fn short_trend(&self) -> f64 {
        self.short_trend
    }

    pub fn long_trend(&self) -> f64 {
        self.long_trend
    }

    /// Close of the most recent bar
    pub fn last_close(&self) -> f64 {
        // compute_trends guarantees at least one bar
        self.bars.last().map(|b| b.close).unwrap_or(0.0)
    }
}
