use super::allocator::Allocation;
use super::waiter::Waiter;
use crate::api::Exchange;
use crate::error::BotError;
use crate::models::{Holdings, MinOrderSizeTable, OrderResult, OrderSide, OrderSpec};
use crate::Result;
use tokio::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Idle,
    Selling,
    AwaitingSettlement,
    RebalancingBuy,
}

/// Settings the executor needs from the bot configuration
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Asset code of the spendable quote balance (e.g. "ZUSD")
    pub quote_asset: String,
    pub ohlc_interval_minutes: u32,
    pub settlement_delay: Duration,
    pub fee_buffer: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            quote_asset: "ZUSD".to_string(),
            ohlc_interval_minutes: 5,
            settlement_delay: Duration::from_secs(30),
            fee_buffer: 0.95,
        }
    }
}

/// A held pair whose trend says exit
#[derive(Debug, Clone, PartialEq)]
pub struct SellCandidate {
    pub pair: String,
    /// Asset code the holding is reported under
    pub base: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedOrder {
    pub pair: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub minimum: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedOrder {
    pub pair: String,
    pub side: OrderSide,
    pub reason: String,
}

/// Everything the executor attempted in one run
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub sold: Vec<OrderResult>,
    pub bought: Vec<OrderResult>,
    pub below_minimum: Vec<SkippedOrder>,
    pub failed: Vec<FailedOrder>,
    pub fresh_quote_balance: Option<f64>,
    pub amount_per_asset: Option<f64>,
    /// Shutdown arrived during settlement; no buys were attempted
    pub cancelled: bool,
}

impl ExecutionReport {
    pub fn orders_submitted(&self) -> usize {
        self.sold.len() + self.bought.len()
    }
}

/// Spend per buy after settlement: the fresh balance split evenly across the
/// actual candidates (at least one share), minus the fee buffer
pub fn amount_per_asset(quote_balance: f64, num_candidates: usize, fee_buffer: f64) -> f64 {
    (quote_balance / num_candidates.max(1) as f64) * fee_buffer
}

/// Sells exits, waits for settlement, then buys with the refreshed balance.
///
/// Orders are independent and best-effort: a failed sell doesn't block buys.
/// Only a failed balance refresh or rejected credentials end a run early.
pub struct TradeExecutor<'a, E: Exchange + ?Sized> {
    exchange: &'a E,
    min_orders: &'a MinOrderSizeTable,
    config: &'a ExecutionConfig,
    waiter: Waiter,
    state: ExecutorState,
}

impl<'a, E: Exchange + ?Sized> TradeExecutor<'a, E> {
    pub fn new(
        exchange: &'a E,
        min_orders: &'a MinOrderSizeTable,
        config: &'a ExecutionConfig,
        waiter: Waiter,
    ) -> Self {
        Self {
            exchange,
            min_orders,
            config,
            waiter,
            state: ExecutorState::Idle,
        }
    }

    pub fn state(&self) -> ExecutorState {
        self.state
    }

    fn transition(&mut self, next: ExecutorState) {
        tracing::debug!(from = ?self.state, to = ?next, "Executor state change");
        self.state = next;
    }

    /// Run sells, the settlement wait, then buys. Always ends back in `Idle`.
    ///
    /// The settlement wait only happens when at least one sell was submitted,
    /// and the balance is only re-read when there is something to buy.
    pub async fn execute(
        &mut self,
        sells: &[SellCandidate],
        buys: &[Allocation],
        holdings: &Holdings,
    ) -> Result<ExecutionReport> {
        let result = self.run(sells, buys, holdings).await;
        self.transition(ExecutorState::Idle);
        result
    }

    async fn run(
        &mut self,
        sells: &[SellCandidate],
        buys: &[Allocation],
        holdings: &Holdings,
    ) -> Result<ExecutionReport> {
        let mut report = ExecutionReport::default();

        self.transition(ExecutorState::Selling);
        let sells_attempted = self.sell_all(sells, holdings, &mut report).await?;

        self.transition(ExecutorState::AwaitingSettlement);
        if sells_attempted > 0 {
            tracing::info!(
                "⏳ Waiting {:?} for {} sell(s) to settle...",
                self.config.settlement_delay,
                sells_attempted
            );
            match self.waiter.sleep(self.config.settlement_delay).await {
                Ok(()) => {}
                Err(BotError::Cancelled) => {
                    tracing::warn!("⚠️  Shutdown during settlement wait, skipping buys");
                    report.cancelled = true;
                    return Ok(report);
                }
                Err(e) => return Err(e),
            }
        }

        self.transition(ExecutorState::RebalancingBuy);
        if buys.is_empty() {
            return Ok(report);
        }

        let fresh = self.exchange.get_balances().await.map_err(|e| {
            tracing::error!("✗ Failed to refresh balance after sells: {}", e);
            e
        })?;
        let quote_balance = fresh.quantity(&self.config.quote_asset);
        let per_asset = amount_per_asset(quote_balance, buys.len(), self.config.fee_buffer);
        report.fresh_quote_balance = Some(quote_balance);
        report.amount_per_asset = Some(per_asset);

        tracing::info!(
            "💰 {} balance {:.2}, {:.2} per asset across {} buy(s)",
            self.config.quote_asset,
            quote_balance,
            per_asset,
            buys.len()
        );

        for allocation in buys {
            self.buy_one(allocation, per_asset, &mut report).await?;
        }

        Ok(report)
    }

    /// Submit a full-position market sell for each exit. Returns how many
    /// submissions were attempted, whatever their outcome.
    async fn sell_all(
        &self,
        sells: &[SellCandidate],
        holdings: &Holdings,
        report: &mut ExecutionReport,
    ) -> Result<usize> {
        let mut attempted = 0;

        for candidate in sells {
            let volume = holdings.quantity(&candidate.base);
            if volume <= 0.0 {
                tracing::debug!(pair = %candidate.pair, "Nothing held, no sell");
                continue;
            }

            let minimum = self.min_orders.min_order(&candidate.pair);
            let spec = match OrderSpec::market(&candidate.pair, OrderSide::Sell, volume, minimum) {
                Ok(spec) => spec,
                Err(e) => {
                    tracing::warn!(
                        pair = %candidate.pair,
                        quantity = volume,
                        minimum,
                        "  ✗ Not selling: {}",
                        e
                    );
                    report.below_minimum.push(SkippedOrder {
                        pair: candidate.pair.clone(),
                        side: OrderSide::Sell,
                        quantity: volume,
                        minimum,
                    });
                    continue;
                }
            };

            tracing::info!("  → Selling {} of {}", spec.formatted_quantity(), candidate.pair);
            attempted += 1;
            self.submit(&spec, report).await?;
        }

        Ok(attempted)
    }

    async fn buy_one(
        &self,
        allocation: &Allocation,
        per_asset: f64,
        report: &mut ExecutionReport,
    ) -> Result<()> {
        let pair = &allocation.pair;

        let price = match self.latest_close(pair).await {
            Ok(price) => price,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                tracing::warn!(pair = %pair, "  ✗ No price for buy: {}", e);
                report.failed.push(FailedOrder {
                    pair: pair.clone(),
                    side: OrderSide::Buy,
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        let volume = per_asset / price;
        let minimum = self.min_orders.min_order(pair);

        match OrderSpec::market(pair, OrderSide::Buy, volume, minimum) {
            Ok(spec) => {
                tracing::info!(
                    price,
                    "  → Buying {} of {}",
                    spec.formatted_quantity(),
                    pair
                );
                self.submit(&spec, report).await
            }
            Err(_) => {
                tracing::info!(
                    pair = %pair,
                    quantity = volume,
                    minimum,
                    "  ✗ Volume {:.8} for {} is below minimum threshold {}",
                    volume,
                    pair,
                    minimum
                );
                report.below_minimum.push(SkippedOrder {
                    pair: pair.clone(),
                    side: OrderSide::Buy,
                    quantity: volume,
                    minimum,
                });
                Ok(())
            }
        }
    }

    async fn latest_close(&self, pair: &str) -> Result<f64> {
        let bars = self
            .exchange
            .get_price_series(pair, self.config.ohlc_interval_minutes)
            .await?;

        bars.last()
            .map(|bar| bar.close)
            .filter(|close| close.is_finite() && *close > 0.0)
            .ok_or_else(|| BotError::InsufficientData {
                pair: pair.to_string(),
                available: bars.len(),
                required: 1,
            })
    }

    /// Submit one order; record the outcome. Only auth failures propagate.
    async fn submit(&self, spec: &OrderSpec, report: &mut ExecutionReport) -> Result<()> {
        match self.exchange.submit_order(spec).await {
            Ok(result) => {
                tracing::info!(
                    pair = %result.pair,
                    txids = ?result.txids,
                    "  ✓ {}",
                    result.description
                );
                match spec.side() {
                    OrderSide::Sell => report.sold.push(result),
                    OrderSide::Buy => report.bought.push(result),
                }
                Ok(())
            }
            Err(e) if e.is_fatal() => {
                tracing::error!(pair = %spec.pair(), "  ✗ Order rejected, credentials invalid: {}", e);
                Err(e)
            }
            Err(e) => {
                tracing::error!(
                    pair = %spec.pair(),
                    side = spec.side().as_str(),
                    quantity = spec.quantity(),
                    "  ✗ Order failed: {}",
                    e
                );
                report.failed.push(FailedOrder {
                    pair: spec.pair().to_string(),
                    side: spec.side(),
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }
}
