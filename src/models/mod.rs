use crate::error::BotError;
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum order size used when a pair has no entry in the table
pub const DEFAULT_MIN_ORDER_SIZE: f64 = 1.0;

/// OHLCV bar for one trading pair
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub pair: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// A tradable market and the asset code its holdings are reported under
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradingPair {
    pub symbol: String,
    pub base: String,
    pub min_order: f64,
}

/// Account balances keyed by asset code, quote currency included.
///
/// Only ever built from a fresh exchange response; the engine never edits it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Holdings {
    balances: HashMap<String, f64>,
}

impl Holdings {
    pub fn new(balances: HashMap<String, f64>) -> Self {
        Self { balances }
    }

    /// Owned quantity of an asset, zero when the exchange doesn't report it
    pub fn quantity(&self, asset: &str) -> f64 {
        self.balances.get(asset).copied().unwrap_or(0.0)
    }

    pub fn is_held(&self, asset: &str) -> bool {
        self.quantity(asset) > 0.0
    }

    pub fn len(&self) -> usize {
        self.balances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.balances.is_empty()
    }
}

impl FromIterator<(String, f64)> for Holdings {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Static pair -> minimum tradable quantity mapping
#[derive(Debug, Clone, Default)]
pub struct MinOrderSizeTable {
    sizes: HashMap<String, f64>,
}

impl MinOrderSizeTable {
    pub fn new(sizes: HashMap<String, f64>) -> Self {
        Self { sizes }
    }

    pub fn from_pairs(pairs: &[TradingPair]) -> Self {
        Self::new(
            pairs
                .iter()
                .map(|p| (p.symbol.clone(), p.min_order))
                .collect(),
        )
    }

    pub fn min_order(&self, pair: &str) -> f64 {
        self.sizes
            .get(pair)
            .copied()
            .unwrap_or(DEFAULT_MIN_ORDER_SIZE)
    }
}

/// Per-pair, per-cycle decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TradeSignal {
    Sell,
    Buy { price: f64 },
    Neutral,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    #[default]
    Market,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market",
        }
    }
}

/// An order ready to submit. Can only be built with a quantity that clears the
/// pair's minimum, so anything that reaches the exchange is valid by construction.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSpec {
    pair: String,
    side: OrderSide,
    quantity: f64,
    kind: OrderKind,
}

impl OrderSpec {
    pub fn market(pair: &str, side: OrderSide, quantity: f64, minimum: f64) -> Result<Self> {
        if !quantity.is_finite() || quantity <= 0.0 || quantity < minimum {
            return Err(BotError::BelowMinimumOrder {
                pair: pair.to_string(),
                quantity,
                minimum,
            });
        }

        Ok(Self {
            pair: pair.to_string(),
            side,
            quantity,
            kind: OrderKind::Market,
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Volume as sent to the exchange (8 decimal places)
    pub fn formatted_quantity(&self) -> String {
        format!("{:.8}", self.quantity)
    }
}

/// What the exchange said about a submitted order.
/// Not a fill confirmation: market orders settle asynchronously.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderResult {
    pub pair: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub txids: Vec<String>,
    pub description: String,
}
