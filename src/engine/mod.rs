// Rebalance cycle orchestration
pub mod planner;
pub mod rebalance_loop;

pub use planner::{SkippedPair, TradePlan, TradePlanner};
pub use rebalance_loop::{CycleReport, RebalanceLoop};
