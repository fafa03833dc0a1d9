use thiserror::Error;

/// Where an exchange call went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Network failure, timeout, or a non-success HTTP status
    Transport,
    /// Credentials rejected (bad key, bad signature, bad nonce)
    Auth,
    /// The exchange accepted the request but reported an error
    Exchange,
    /// The response body could not be parsed
    Decode,
}

#[derive(Debug, Error)]
pub enum BotError {
    #[error("API error ({kind:?}): {message}")]
    Api { kind: ApiErrorKind, message: String },

    #[error("Insufficient data for {pair}: {available} bars, need {required}")]
    InsufficientData {
        pair: String,
        available: usize,
        required: usize,
    },

    #[error("Invalid price series for {pair}: {reason}")]
    InvalidSeries { pair: String, reason: String },

    #[error("Order for {pair} below minimum: {quantity:.8} < {minimum}")]
    BelowMinimumOrder {
        pair: String,
        quantity: f64,
        minimum: f64,
    },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Cancelled by shutdown signal")]
    Cancelled,
}

impl BotError {
    pub fn api(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self::Api {
            kind,
            message: message.into(),
        }
    }

    /// Errors that make every further decision untrustworthy.
    /// Only rejected credentials qualify; everything else is retried next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Api {
                kind: ApiErrorKind::Auth,
                ..
            }
        )
    }

    /// Errors scoped to a single pair or order; the cycle carries on without it
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientData { .. } | Self::InvalidSeries { .. } | Self::BelowMinimumOrder { .. }
        )
    }
}

impl From<reqwest::Error> for BotError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::api(ApiErrorKind::Decode, e.to_string())
        } else {
            Self::api(ApiErrorKind::Transport, e.to_string())
        }
    }
}

impl From<serde_json::Error> for BotError {
    fn from(e: serde_json::Error) -> Self {
        Self::api(ApiErrorKind::Decode, e.to_string())
    }
}

impl From<config::ConfigError> for BotError {
    fn from(e: config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}
