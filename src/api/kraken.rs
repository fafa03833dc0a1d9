use super::Exchange;
use crate::error::{ApiErrorKind, BotError};
use crate::models::{Candle, Holdings, OrderResult, OrderSpec};
use crate::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::DateTime;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256, Sha512};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

// Kraken Spot REST API
// Docs: https://docs.kraken.com/api/docs/rest-api/add-order
const KRAKEN_API_BASE: &str = "https://api.kraken.com";
const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF_MS: u64 = 1000;

type HmacSha512 = Hmac<Sha512>;

type KrakenRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Kraken error prefixes that mean the credentials themselves are bad
const AUTH_ERROR_PREFIXES: &[&str] = &[
    "EAPI:Invalid key",
    "EAPI:Invalid signature",
    "EAPI:Invalid nonce",
    "EGeneral:Permission denied",
];

#[derive(Clone)]
struct Credentials {
    api_key: String,
    api_secret: String,
}

/// Every Kraken response is `{"error": [...], "result": ...}`
#[derive(Debug, Deserialize)]
struct KrakenResponse<T> {
    #[serde(default)]
    error: Vec<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct AddOrderResult {
    descr: OrderDescription,
    #[serde(default)]
    txid: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OrderDescription {
    order: String,
}

/// Thin Kraken spot client: balances, OHLC bars, market orders
///
/// Cloneable; clones share the rate limiter and nonce counter.
#[derive(Clone)]
pub struct KrakenClient {
    client: Client,
    base_url: String,
    credentials: Option<Credentials>,
    validate_only: bool,
    rate_limiter: Arc<KrakenRateLimiter>,
    last_nonce: Arc<AtomicU64>,
}

impl KrakenClient {
    /// Client for public endpoints only
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        // Public endpoints allow roughly one call per second
        let quota = Quota::per_second(NonZeroU32::MIN);

        Ok(Self {
            client,
            base_url: KRAKEN_API_BASE.to_string(),
            credentials: None,
            validate_only: false,
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
            last_nonce: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Client able to read balances and place orders
    pub fn with_credentials(api_key: String, api_secret: String) -> Result<Self> {
        let mut client = Self::new()?;
        client.credentials = Some(Credentials {
            api_key,
            api_secret,
        });
        Ok(client)
    }

    /// Point at another host (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Orders are sent with `validate=true`: checked by the exchange, never placed
    pub fn with_validate_only(mut self, validate_only: bool) -> Self {
        self.validate_only = validate_only;
        self
    }

    /// Strictly increasing millisecond nonce
    fn next_nonce(&self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let mut last = self.last_nonce.load(Ordering::SeqCst);
        loop {
            let next = now.max(last + 1);
            match self
                .last_nonce
                .compare_exchange(last, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }

    /// Rate-limited public GET with retry on transport errors and 5xx
    async fn public_get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_error = None;

        for attempt in 1..=MAX_RETRIES {
            self.rate_limiter.until_ready().await;

            match self.client.get(&url).query(query).send().await {
                Ok(response) if response.status().is_server_error() && attempt < MAX_RETRIES => {
                    last_error = Some(BotError::api(
                        ApiErrorKind::Transport,
                        format!("HTTP {} from {}", response.status(), path),
                    ));
                }
                Ok(response) => return Self::parse_response(path, response).await,
                Err(e) => last_error = Some(e.into()),
            }

            if attempt < MAX_RETRIES {
                let backoff_ms = INITIAL_BACKOFF_MS * 2_u64.pow(attempt - 1);
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}. Retrying in {}ms...",
                    attempt,
                    MAX_RETRIES,
                    path,
                    last_error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
                    backoff_ms
                );
                sleep(Duration::from_millis(backoff_ms)).await;
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BotError::api(ApiErrorKind::Transport, format!("{} failed after {} retries", path, MAX_RETRIES))
        }))
    }

    /// Signed private POST. Never retried.
    async fn private_post<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> Result<T> {
        let credentials = self.credentials.as_ref().ok_or_else(|| {
            BotError::api(ApiErrorKind::Auth, "no API credentials configured")
        })?;

        self.rate_limiter.until_ready().await;

        let nonce = self.next_nonce();
        let mut postdata = format!("nonce={}", nonce);
        for (key, value) in params {
            postdata.push_str(&format!("&{}={}", key, value));
        }
        let signature = sign_request(&credentials.api_secret, path, nonce, &postdata)?;

        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .header("API-Key", &credentials.api_key)
            .header("API-Sign", signature)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(postdata)
            .send()
            .await?;

        Self::parse_response(path, response).await
    }

    async fn parse_response<T: DeserializeOwned>(path: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BotError::api(
                ApiErrorKind::Transport,
                format!("HTTP {} from {}: {}", status, path, body),
            ));
        }

        let parsed: KrakenResponse<T> = serde_json::from_str(&body)?;
        if !parsed.error.is_empty() {
            return Err(classify_errors(&parsed.error));
        }

        parsed.result.ok_or_else(|| {
            BotError::api(ApiErrorKind::Decode, format!("{} returned no result", path))
        })
    }
}

/// Kraken `API-Sign`: HMAC-SHA512 over `path || SHA256(nonce || postdata)`
/// keyed with the base64-decoded secret, base64 encoded
pub fn sign_request(api_secret: &str, path: &str, nonce: u64, postdata: &str) -> Result<String> {
    let secret = BASE64.decode(api_secret).map_err(|e| {
        BotError::api(ApiErrorKind::Auth, format!("API secret is not valid base64: {}", e))
    })?;

    let mut sha = Sha256::new();
    sha.update(nonce.to_string().as_bytes());
    sha.update(postdata.as_bytes());
    let digest = sha.finalize();

    let mut mac = HmacSha512::new_from_slice(&secret)
        .map_err(|e| BotError::api(ApiErrorKind::Auth, format!("Invalid key length: {}", e)))?;
    mac.update(path.as_bytes());
    mac.update(&digest);

    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn classify_errors(errors: &[String]) -> BotError {
    let message = errors.join("; ");
    let is_auth = errors
        .iter()
        .any(|e| AUTH_ERROR_PREFIXES.iter().any(|prefix| e.starts_with(prefix)));

    if is_auth {
        BotError::api(ApiErrorKind::Auth, message)
    } else {
        BotError::api(ApiErrorKind::Exchange, message)
    }
}

/// Kraken sends most numbers as strings
fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Rows are `[time, open, high, low, close, vwap, volume, count]`
fn parse_ohlc_row(pair: &str, row: &Value) -> Result<Candle> {
    let decode = |what: &str| {
        BotError::api(
            ApiErrorKind::Decode,
            format!("{}: bad OHLC row field {} in {}", pair, what, row),
        )
    };
    let fields = row.as_array().ok_or_else(|| decode("row"))?;
    let field = |i: usize, what: &str| {
        fields
            .get(i)
            .and_then(value_to_f64)
            .ok_or_else(|| decode(what))
    };

    let time = fields
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| decode("time"))?;
    let timestamp = DateTime::from_timestamp(time, 0).ok_or_else(|| decode("time"))?;

    Ok(Candle {
        pair: pair.to_string(),
        timestamp,
        open: field(1, "open")?,
        high: field(2, "high")?,
        low: field(3, "low")?,
        close: field(4, "close")?,
        volume: field(6, "volume")?,
    })
}

#[async_trait]
impl Exchange for KrakenClient {
    async fn get_balances(&self) -> Result<Holdings> {
        let raw: HashMap<String, String> = self.private_post("/0/private/Balance", &[]).await?;

        raw.into_iter()
            .map(|(asset, amount)| {
                amount
                    .parse::<f64>()
                    .map(|qty| (asset.clone(), qty))
                    .map_err(|_| {
                        BotError::api(
                            ApiErrorKind::Decode,
                            format!("balance for {} is not a number: {}", asset, amount),
                        )
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(|balances| balances.into_iter().collect())
    }

    async fn get_price_series(&self, pair: &str, interval_minutes: u32) -> Result<Vec<Candle>> {
        let result: HashMap<String, Value> = self
            .public_get(
                "/0/public/OHLC",
                &[("pair", pair.to_string()), ("interval", interval_minutes.to_string())],
            )
            .await?;

        // Result is keyed by Kraken's canonical pair name, which may differ
        // from the requested one (XBTUSD -> XXBTZUSD)
        let rows = result
            .iter()
            .find(|(key, _)| key.as_str() != "last")
            .and_then(|(_, value)| value.as_array())
            .ok_or_else(|| {
                BotError::api(ApiErrorKind::Decode, format!("no OHLC data for {}", pair))
            })?;

        let candles = rows
            .iter()
            .map(|row| parse_ohlc_row(pair, row))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!("Fetched {} bars for {}", candles.len(), pair);
        Ok(candles)
    }

    async fn submit_order(&self, order: &OrderSpec) -> Result<OrderResult> {
        let mut params = vec![
            ("pair", order.pair().to_string()),
            ("type", order.side().as_str().to_string()),
            ("ordertype", order.kind().as_str().to_string()),
            ("volume", order.formatted_quantity()),
        ];
        if self.validate_only {
            params.push(("validate", "true".to_string()));
        }

        let result: AddOrderResult = self.private_post("/0/private/AddOrder", &params).await?;

        let description = if self.validate_only {
            format!("(validated only) {}", result.descr.order)
        } else {
            result.descr.order
        };

        Ok(OrderResult {
            pair: order.pair().to_string(),
            side: order.side(),
            quantity: order.quantity(),
            txids: result.txid,
            description,
        })
    }
}
