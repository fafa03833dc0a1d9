// Core modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod execution;
pub mod indicators;
pub mod models;
pub mod strategy;

// Re-export commonly used types
pub use api::Exchange;
pub use config::BotConfig;
pub use engine::RebalanceLoop;
pub use error::{ApiErrorKind, BotError};
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, BotError>;
