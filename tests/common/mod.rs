#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use trendrotor::config::{BotConfig, PairEntry};
use trendrotor::{
    ApiErrorKind, BotError, Candle, Exchange, Holdings, OrderResult, OrderSpec, Result,
};

/// In-memory exchange with scripted balances, bars and order outcomes
#[derive(Default)]
pub struct FakeExchange {
    /// Each call pops the front; the last entry repeats forever
    balances: Mutex<VecDeque<std::result::Result<Holdings, ApiErrorKind>>>,
    series: HashMap<String, Vec<Candle>>,
    series_failures: HashMap<String, ApiErrorKind>,
    order_failures: HashMap<String, ApiErrorKind>,
    orders: Mutex<Vec<OrderSpec>>,
    balance_calls: AtomicUsize,
    series_calls: AtomicUsize,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_balances(self, holdings: Holdings) -> Self {
        self.push_balance(Ok(holdings));
        self
    }

    pub fn with_failing_balances(self, kind: ApiErrorKind) -> Self {
        self.push_balance(Err(kind));
        self
    }

    pub fn with_series(mut self, pair: &str, bars: Vec<Candle>) -> Self {
        self.series.insert(pair.to_string(), bars);
        self
    }

    pub fn with_failing_series(mut self, pair: &str, kind: ApiErrorKind) -> Self {
        self.series_failures.insert(pair.to_string(), kind);
        self
    }

    pub fn with_failing_order(mut self, pair: &str, kind: ApiErrorKind) -> Self {
        self.order_failures.insert(pair.to_string(), kind);
        self
    }

    fn push_balance(&self, entry: std::result::Result<Holdings, ApiErrorKind>) {
        self.balances.lock().unwrap().push_back(entry);
    }

    pub fn orders(&self) -> Vec<OrderSpec> {
        self.orders.lock().unwrap().clone()
    }

    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    pub fn series_calls(&self) -> usize {
        self.series_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Exchange for FakeExchange {
    async fn get_balances(&self) -> Result<Holdings> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);

        let mut balances = self.balances.lock().unwrap();
        let entry = if balances.len() > 1 {
            balances.pop_front()
        } else {
            balances.front().cloned()
        };

        match entry {
            Some(Ok(holdings)) => Ok(holdings),
            Some(Err(kind)) => Err(BotError::api(kind, "scripted balance failure")),
            None => Ok(Holdings::default()),
        }
    }

    async fn get_price_series(&self, pair: &str, _interval_minutes: u32) -> Result<Vec<Candle>> {
        self.series_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(kind) = self.series_failures.get(pair) {
            return Err(BotError::api(*kind, format!("scripted OHLC failure for {}", pair)));
        }
        Ok(self.series.get(pair).cloned().unwrap_or_default())
    }

    async fn submit_order(&self, order: &OrderSpec) -> Result<OrderResult> {
        if let Some(kind) = self.order_failures.get(order.pair()) {
            return Err(BotError::api(*kind, format!("scripted rejection for {}", order.pair())));
        }

        let mut orders = self.orders.lock().unwrap();
        orders.push(order.clone());

        Ok(OrderResult {
            pair: order.pair().to_string(),
            side: order.side(),
            quantity: order.quantity(),
            txids: vec![format!("TX-{}", orders.len())],
            description: format!(
                "{} {} {} @ market",
                order.side().as_str(),
                order.formatted_quantity(),
                order.pair()
            ),
        })
    }
}

pub fn holdings(entries: &[(&str, f64)]) -> Holdings {
    entries
        .iter()
        .map(|(asset, qty)| (asset.to_string(), *qty))
        .collect()
}

/// 26 five-minute bars: 14 at `old`, then 12 at `recent`
pub fn step_candles(pair: &str, old: f64, recent: f64) -> Vec<Candle> {
    let mut closes = vec![old; 14];
    closes.extend(vec![recent; 12]);
    candles(pair, &closes)
}

pub fn candles(pair: &str, closes: &[f64]) -> Vec<Candle> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Candle {
            pair: pair.to_string(),
            timestamp: start + Duration::minutes(i as i64 * 5),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        })
        .collect()
}

/// Config over the given `(symbol, min_order)` pairs, everything else default
pub fn config(pairs: &[(&str, f64)]) -> BotConfig {
    BotConfig {
        pairs: pairs
            .iter()
            .map(|(symbol, min_order)| PairEntry {
                symbol: symbol.to_string(),
                base: None,
                min_order: Some(*min_order),
            })
            .collect(),
        ..BotConfig::default()
    }
}
