pub mod kraken;

pub use kraken::KrakenClient;

use crate::models::{Candle, Holdings, OrderResult, OrderSpec};
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The exchange as seen by the engine.
///
/// Implementations own transport and authentication; the engine only ever
/// reads balances and bars and submits market orders through this seam.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Current balances keyed by asset code, quote currency included
    async fn get_balances(&self) -> Result<Holdings>;

    /// OHLC bars for a pair in ascending time order
    async fn get_price_series(&self, pair: &str, interval_minutes: u32) -> Result<Vec<Candle>>;

    /// Submit an order once. Not retried: a transport failure leaves the
    /// exchange-side outcome unknown.
    async fn submit_order(&self, order: &OrderSpec) -> Result<OrderResult>;
}

#[async_trait]
impl<T: Exchange + ?Sized> Exchange for Arc<T> {
    async fn get_balances(&self) -> Result<Holdings> {
        (**self).get_balances().await
    }

    async fn get_price_series(&self, pair: &str, interval_minutes: u32) -> Result<Vec<Candle>> {
        (**self).get_price_series(pair, interval_minutes).await
    }

    async fn submit_order(&self, order: &OrderSpec) -> Result<OrderResult> {
        (**self).submit_order(order).await
    }
}
