use super::planner::{SkippedPair, TradePlan, TradePlanner};
use crate::api::Exchange;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::execution::{
    AllocationConfig, CapitalAllocator, ExecutionConfig, ExecutionReport, TradeExecutor, Waiter,
};
use crate::models::{MinOrderSizeTable, TradeSignal, TradingPair};
use crate::strategy::{SignalConfig, SignalEvaluator};
use crate::Result;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// What one cycle saw and did
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub quote_balance: f64,
    pub evaluated: usize,
    pub skipped: Vec<SkippedPair>,
    pub plan: TradePlan,
    /// `None` when the plan had nothing to do
    pub execution: Option<ExecutionReport>,
}

/// Fetch -> evaluate -> allocate -> execute, then wait and repeat
pub struct RebalanceLoop<E: Exchange> {
    exchange: E,
    pairs: Vec<TradingPair>,
    planner: TradePlanner,
    min_orders: MinOrderSizeTable,
    execution: ExecutionConfig,
    cycle_interval: Duration,
    max_consecutive_failures: u32,
    waiter: Waiter,
}

impl<E: Exchange> RebalanceLoop<E> {
    pub fn new(exchange: E, config: &BotConfig, cancel: CancellationToken) -> Self {
        let pairs = config.trading_pairs();
        let min_orders = config.min_order_table();

        Self {
            exchange,
            planner: Self::build_planner(
                config.signal.clone(),
                config.allocation.clone(),
                min_orders.clone(),
            ),
            pairs,
            min_orders,
            execution: config.execution_config(),
            cycle_interval: config.cycle_interval(),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
            waiter: Waiter::new(cancel),
        }
    }

    fn build_planner(
        signal: SignalConfig,
        allocation: AllocationConfig,
        min_orders: MinOrderSizeTable,
    ) -> TradePlanner {
        TradePlanner::new(
            SignalEvaluator::new(signal),
            CapitalAllocator::new(allocation, min_orders),
        )
    }

    pub fn exchange(&self) -> &E {
        &self.exchange
    }

    /// Run cycles until shutdown (`Ok`) or an unrecoverable error (`Err`)
    pub async fn run(&self) -> Result<()> {
        let mut consecutive_failures = 0u32;

        loop {
            match self.run_cycle().await {
                Ok(report) => {
                    consecutive_failures = 0;
                    if report.execution.as_ref().is_some_and(|e| e.cancelled) {
                        return Ok(());
                    }
                }
                Err(BotError::Cancelled) => return Ok(()),
                Err(e) if e.is_fatal() => {
                    tracing::error!("❌ Unrecoverable error, stopping: {}", e);
                    return Err(e);
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::error!(
                        "✗ Cycle aborted ({}/{} in a row): {}",
                        consecutive_failures,
                        self.max_consecutive_failures,
                        e
                    );
                    if consecutive_failures >= self.max_consecutive_failures {
                        tracing::error!("❌ Too many failed cycles, stopping");
                        return Err(e);
                    }
                }
            }

            tracing::info!("💤 Next cycle in {:?}", self.cycle_interval);
            match self.waiter.sleep(self.cycle_interval).await {
                Ok(()) => {}
                Err(BotError::Cancelled) => return Ok(()),
                Err(e) => return Err(e),
            }
        }
    }

    /// One full cycle against a single balance snapshot
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", %cycle_id);
        self.cycle(cycle_id).instrument(span).await
    }

    async fn cycle(&self, cycle_id: Uuid) -> Result<CycleReport> {
        tracing::info!(
            "🔄 Rebalance cycle starting at {}",
            chrono::Utc::now().format("%H:%M:%S")
        );

        let holdings = self.exchange.get_balances().await.map_err(|e| {
            tracing::error!("✗ Failed to fetch balances: {}", e);
            e
        })?;
        if holdings.is_empty() {
            tracing::warn!("⚠️  Exchange reported no balances at all");
        }
        let quote_balance = holdings.quantity(&self.execution.quote_asset);
        tracing::info!(
            "  {} balance: {:.2} ({} assets reported)",
            self.execution.quote_asset,
            quote_balance,
            holdings.len()
        );

        let mut signals: Vec<(TradingPair, TradeSignal)> = Vec::with_capacity(self.pairs.len());
        let mut skipped = Vec::new();

        for pair in &self.pairs {
            if self.waiter.is_cancelled() {
                return Err(BotError::Cancelled);
            }

            let evaluation = match self
                .exchange
                .get_price_series(&pair.symbol, self.execution.ohlc_interval_minutes)
                .await
            {
                Ok(bars) => self.planner.evaluate_pair(pair, bars, &holdings),
                Err(e) => Err(e),
            };

            match evaluation {
                Ok(signal) => {
                    if signal != TradeSignal::Neutral {
                        tracing::info!("  {} → {:?}", pair.symbol, signal);
                    }
                    signals.push((pair.clone(), signal));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    if e.is_recoverable() {
                        tracing::info!("  {} - Not enough usable data, skipping: {}", pair.symbol, e);
                    } else {
                        tracing::warn!("  {} - Fetch failed, skipping this cycle: {}", pair.symbol, e);
                    }
                    skipped.push(SkippedPair {
                        pair: pair.symbol.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        let plan = self.planner.plan(quote_balance, &signals);

        tracing::info!(
            "📊 Evaluated {} pairs ({} skipped): {} to sell, {} to buy",
            signals.len(),
            skipped.len(),
            plan.sells.len(),
            plan.buys.len()
        );

        let execution = if plan.has_trades() {
            let mut executor = TradeExecutor::new(
                &self.exchange,
                &self.min_orders,
                &self.execution,
                self.waiter.clone(),
            );
            let report = executor.execute(&plan.sells, &plan.buys, &holdings).await?;

            tracing::info!(
                "✅ Cycle done: {} orders submitted ({} sold, {} bought), {} below minimum, {} failed",
                report.orders_submitted(),
                report.sold.len(),
                report.bought.len(),
                report.below_minimum.len(),
                report.failed.len()
            );
            Some(report)
        } else {
            tracing::info!("No trades made");
            None
        };

        Ok(CycleReport {
            cycle_id,
            quote_balance,
            evaluated: signals.len(),
            skipped,
            plan,
            execution,
        })
    }
}
