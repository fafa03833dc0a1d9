use crate::execution::{Allocation, BuyCandidate, CapitalAllocator, SellCandidate};
use crate::models::{Candle, Holdings, TradeSignal, TradingPair};
use crate::strategy::SignalEvaluator;
use crate::Result;

/// A pair left out of this cycle and why
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedPair {
    pub pair: String,
    pub reason: String,
}

/// What one cycle intends to do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradePlan {
    pub sells: Vec<SellCandidate>,
    pub buys: Vec<Allocation>,
}

impl TradePlan {
    pub fn has_trades(&self) -> bool {
        !self.sells.is_empty() || !self.buys.is_empty()
    }
}

/// Turns bars and holdings into signals, then signals into a trade plan.
///
/// Holds no state between calls; identical inputs give identical plans.
#[derive(Debug, Clone)]
pub struct TradePlanner {
    evaluator: SignalEvaluator,
    allocator: CapitalAllocator,
}

impl TradePlanner {
    pub fn new(evaluator: SignalEvaluator, allocator: CapitalAllocator) -> Self {
        Self {
            evaluator,
            allocator,
        }
    }

    /// Signal for one pair given its bars and whether its base asset is held
    pub fn evaluate_pair(
        &self,
        pair: &TradingPair,
        bars: Vec<Candle>,
        holdings: &Holdings,
    ) -> Result<TradeSignal> {
        let series = self.evaluator.series(&pair.symbol, bars)?;
        self.evaluator
            .evaluate(&series, holdings.is_held(&pair.base))
    }

    /// Partition evaluated pairs into exits and funded buys
    pub fn plan(&self, quote_balance: f64, signals: &[(TradingPair, TradeSignal)]) -> TradePlan {
        let mut sells = Vec::new();
        let mut candidates = Vec::new();

        for (pair, signal) in signals {
            match signal {
                TradeSignal::Sell => sells.push(SellCandidate {
                    pair: pair.symbol.clone(),
                    base: pair.base.clone(),
                }),
                TradeSignal::Buy { price } => candidates.push(BuyCandidate {
                    pair: pair.symbol.clone(),
                    price: *price,
                }),
                TradeSignal::Neutral => {}
            }
        }

        let buys = self.allocator.allocate(quote_balance, &candidates);

        TradePlan { sells, buys }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::AllocationConfig;
    use crate::models::MinOrderSizeTable;
    use crate::strategy::SignalConfig;
    use chrono::{Duration, TimeZone, Utc};

    fn trading_pair(symbol: &str, base: &str, min_order: f64) -> TradingPair {
        TradingPair {
            symbol: symbol.to_string(),
            base: base.to_string(),
            min_order,
        }
    }

    fn step_candles(pair: &str, old: f64, recent: f64) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut prices = vec![old; 14];
        prices.extend(vec![recent; 12]);
        prices
            .iter()
            .enumerate()
            .map(|(i, &price)| Candle {
                pair: pair.to_string(),
                timestamp: start + Duration::minutes(i as i64 * 5),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 10.0,
            })
            .collect()
    }

    fn planner(pairs: &[TradingPair]) -> TradePlanner {
        TradePlanner::new(
            SignalEvaluator::new(SignalConfig::default()),
            CapitalAllocator::new(AllocationConfig::default(), MinOrderSizeTable::from_pairs(pairs)),
        )
    }

    #[test]
    fn test_plan_partitions_sells_and_affordable_buys() {
        let pairs = vec![
            trading_pair("XXBTZUSD", "XXBT", 0.0001),
            trading_pair("ADAUSD", "ADA", 20.0),
            trading_pair("SOLUSD", "SOL", 0.02),
            trading_pair("DOTUSD", "DOT", 0.5),
        ];
        let planner = planner(&pairs);
        let holdings: Holdings = vec![("XXBT".to_string(), 0.01), ("ZUSD".to_string(), 1000.0)]
            .into_iter()
            .collect();

        let bars = [
            step_candles("XXBTZUSD", 30000.0, 29000.0), // held, falling -> sell
            step_candles("ADAUSD", 0.3, 0.5),           // rising but 20 * 0.5 = 10 fits
            step_candles("SOLUSD", 100.0, 150.0),       // rising, 0.02 * 150 = 3 fits
            step_candles("DOTUSD", 5.0, 5.0),           // flat, unheld -> neutral
        ];

        let signals: Vec<(TradingPair, TradeSignal)> = pairs
            .iter()
            .zip(bars)
            .map(|(pair, bars)| {
                let signal = planner.evaluate_pair(pair, bars, &holdings).unwrap();
                (pair.clone(), signal)
            })
            .collect();

        let plan = planner.plan(holdings.quantity("ZUSD"), &signals);
        assert!(plan.has_trades());
        assert_eq!(
            plan.sells,
            vec![SellCandidate {
                pair: "XXBTZUSD".to_string(),
                base: "XXBT".to_string()
            }]
        );
        let buys: Vec<&str> = plan.buys.iter().map(|a| a.pair.as_str()).collect();
        assert_eq!(buys, vec!["SOLUSD", "ADAUSD"]);
    }

    #[test]
    fn test_identical_inputs_give_identical_signals() {
        let pairs = vec![
            trading_pair("ADAUSD", "ADA", 20.0),
            trading_pair("SOLUSD", "SOL", 0.02),
        ];
        let planner = planner(&pairs);
        let holdings: Holdings = vec![("ADA".to_string(), 50.0)].into_iter().collect();

        let run = || -> Vec<TradeSignal> {
            vec![
                planner
                    .evaluate_pair(&pairs[0], step_candles("ADAUSD", 0.5, 0.4), &holdings)
                    .unwrap(),
                planner
                    .evaluate_pair(&pairs[1], step_candles("SOLUSD", 100.0, 150.0), &holdings)
                    .unwrap(),
            ]
        };

        let first = run();
        let second = run();
        assert_eq!(first, second);
        assert_eq!(first, vec![TradeSignal::Sell, TradeSignal::Buy { price: 150.0 }]);
    }

    #[test]
    fn test_no_signals_no_trades() {
        let planner = planner(&[]);
        let plan = planner.plan(1000.0, &[]);
        assert!(!plan.has_trades());
    }
}
