/// Calculate Simple Moving Average (SMA) over the trailing `period` values
///
/// Returns `None` when fewer than `period` values exist or `period` is zero.
pub fn calculate_sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let sum: f64 = prices.iter().rev().take(period).sum();
    Some(sum / period as f64)
}
