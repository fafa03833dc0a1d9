// Capital allocation and order execution module
pub mod allocator;
pub mod executor;
pub mod waiter;

pub use allocator::{AllocationConfig, Allocation, BuyCandidate, CapitalAllocator};
pub use executor::{
    amount_per_asset, ExecutionConfig, ExecutionReport, ExecutorState, FailedOrder, SellCandidate,
    SkippedOrder, TradeExecutor,
};
pub use waiter::Waiter;
