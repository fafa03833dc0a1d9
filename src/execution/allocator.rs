use crate::models::MinOrderSizeTable;
use serde::{Deserialize, Serialize};

/// Capital split policy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AllocationConfig {
    /// Capital is notionally divided this many ways, and at most this many
    /// assets are bought per cycle
    pub slots: usize,
    /// Fraction of each share actually spent (the rest covers fees/slippage)
    pub fee_buffer: f64,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            slots: 4,
            fee_buffer: 0.95,
        }
    }
}

/// A pair whose trend qualifies for buying, priced at its latest close
#[derive(Debug, Clone, PartialEq)]
pub struct BuyCandidate {
    pub pair: String,
    pub price: f64,
}

/// A selected buy and the per-asset budget it was judged affordable against
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub pair: String,
    pub price: f64,
    pub budget: f64,
}

/// Picks which buy candidates get capital this cycle
#[derive(Debug, Clone)]
pub struct CapitalAllocator {
    config: AllocationConfig,
    min_orders: MinOrderSizeTable,
}

impl CapitalAllocator {
    pub fn new(config: AllocationConfig, min_orders: MinOrderSizeTable) -> Self {
        Self { config, min_orders }
    }

    /// Budget per asset for the affordability test.
    ///
    /// Always divides by the fixed slot count, however many candidates exist.
    /// Execution re-divides the post-sell balance by the actual candidate count
    /// (see `executor::amount_per_asset`); the two formulas differ on purpose.
    pub fn per_asset_budget(&self, quote_balance: f64) -> f64 {
        (quote_balance / self.config.slots.max(1) as f64) * self.config.fee_buffer
    }

    /// Can `budget` buy at least the pair's minimum order at `price`?
    pub fn is_affordable(&self, pair: &str, price: f64, budget: f64) -> bool {
        price * self.min_orders.min_order(pair) <= budget
    }

    /// Rank affordable candidates by price, highest first, and keep the top slots.
    ///
    /// Highest-price-first is the established tie-break under a fixed per-slot
    /// budget. Equal prices keep their input order.
    pub fn allocate(&self, quote_balance: f64, candidates: &[BuyCandidate]) -> Vec<Allocation> {
        let budget = self.per_asset_budget(quote_balance);

        let mut affordable: Vec<&BuyCandidate> = candidates
            .iter()
            .filter(|c| {
                let ok = self.is_affordable(&c.pair, c.price, budget);
                if !ok {
                    tracing::info!(
                        pair = %c.pair,
                        price = c.price,
                        minimum = self.min_orders.min_order(&c.pair),
                        budget,
                        "    Buy candidate unaffordable at per-asset budget"
                    );
                }
                ok
            })
            .collect();

        affordable.sort_by(|a, b| b.price.total_cmp(&a.price));

        affordable
            .into_iter()
            .take(self.config.slots)
            .map(|c| Allocation {
                pair: c.pair.clone(),
                price: c.price,
                budget,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn candidate(pair: &str, price: f64) -> BuyCandidate {
        BuyCandidate {
            pair: pair.to_string(),
            price,
        }
    }

    fn allocator_with(sizes: &[(&str, f64)]) -> CapitalAllocator {
        let table = MinOrderSizeTable::new(
            sizes
                .iter()
                .map(|(p, s)| (p.to_string(), *s))
                .collect::<HashMap<_, _>>(),
        );
        CapitalAllocator::new(AllocationConfig::default(), table)
    }

    #[test]
    fn test_per_asset_budget_uses_fixed_four_slots() {
        let allocator = allocator_with(&[]);
        // 1000 / 4 * 0.95
        assert_eq!(allocator.per_asset_budget(1000.0), 237.5);
        assert_eq!(allocator.per_asset_budget(0.0), 0.0);
    }

    #[test]
    fn test_selects_by_price_descending() {
        let allocator = allocator_with(&[]);
        let candidates = vec![
            candidate("AUSD", 10.0),
            candidate("BUSD", 50.0),
            candidate("CUSD", 5.0),
            candidate("DUSD", 100.0),
        ];

        let selected = allocator.allocate(10_000.0, &candidates);
        let prices: Vec<f64> = selected.iter().map(|a| a.price).collect();
        assert_eq!(prices, vec![100.0, 50.0, 10.0, 5.0]);
        assert!(selected.iter().all(|a| a.budget == 2375.0));
    }

    #[test]
    fn test_never_selects_more_than_four() {
        let allocator = allocator_with(&[]);
        let candidates: Vec<BuyCandidate> = (1..=10)
            .map(|i| candidate(&format!("P{}USD", i), i as f64))
            .collect();

        let selected = allocator.allocate(10_000.0, &candidates);
        assert_eq!(selected.len(), 4);
        let pairs: Vec<&str> = selected.iter().map(|a| a.pair.as_str()).collect();
        assert_eq!(pairs, vec!["P10USD", "P9USD", "P8USD", "P7USD"]);
    }

    #[test]
    fn test_never_selects_unaffordable() {
        // budget = 100 / 4 * 0.95 = 23.75
        let allocator = allocator_with(&[("AAVEUSD", 0.07), ("ADAUSD", 20.0)]);
        let candidates = vec![
            candidate("AAVEUSD", 90.0), // 6.30 needed
            candidate("ADAUSD", 1.5),   // 30.00 needed
            candidate("XUSD", 23.75),   // default minimum 1, exactly the budget
            candidate("YUSD", 24.0),    // default minimum 1, over budget
        ];

        let selected = allocator.allocate(100.0, &candidates);
        let pairs: Vec<&str> = selected.iter().map(|a| a.pair.as_str()).collect();
        assert_eq!(pairs, vec!["AAVEUSD", "XUSD"]);
    }

    #[test]
    fn test_empty_when_nothing_affordable() {
        let allocator = allocator_with(&[]);
        assert!(allocator.allocate(10.0, &[candidate("AUSD", 50.0)]).is_empty());
        assert!(allocator.allocate(1000.0, &[]).is_empty());
    }

    #[test]
    fn test_equal_prices_keep_input_order() {
        let allocator = allocator_with(&[]);
        let candidates = vec![candidate("AUSD", 10.0), candidate("BUSD", 10.0)];

        let selected = allocator.allocate(1000.0, &candidates);
        assert_eq!(selected[0].pair, "AUSD");
        assert_eq!(selected[1].pair, "BUSD");
    }
}
