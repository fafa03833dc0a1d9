// Technical indicators module
// Simple moving averages and the per-pair trend series built on them

pub mod moving_average;
pub mod price_series;

pub use moving_average::calculate_sma;
pub use price_series::PriceSeries;
