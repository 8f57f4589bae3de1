//! Fill simulation: commissions and entry slippage.

/// Execution costs applied by the ledger and the sizer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    pub commission_per_trade: f64,
    pub commission_pct: f64,
    pub slippage_pct: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            commission_per_trade: 10.0,
            commission_pct: 0.0,
            slippage_pct: 0.0,
        }
    }
}

/// Calculate commission: flat_fee + (trade_value * pct / 100).
pub fn calculate_commission(trade_value: f64, config: &ExecutionConfig) -> f64 {
    config.commission_per_trade + (trade_value * config.commission_pct / 100.0)
}

/// Long entry (buy): execution_price = market_price * (1 + slippage_pct / 100),
/// rounded to the exchange's 3-decimal tick.
pub fn apply_entry_slippage(market_price: f64, slippage_pct: f64) -> f64 {
    round_price(market_price * (1.0 + slippage_pct / 100.0))
}

pub fn round_price(price: f64) -> f64 {
    (price * 1000.0).round() / 1000.0
}

/// Largest share count whose cost plus commission fits in `cash`.
pub fn max_affordable_shares(cash: f64, price: f64, config: &ExecutionConfig) -> u64 {
    if price <= 0.0 || cash <= config.commission_per_trade {
        return 0;
    }
    let per_share = price * (1.0 + config.commission_pct / 100.0);
    let mut shares = ((cash - config.commission_per_trade) / per_share).floor() as u64;
    // Float rounding can leave the boundary share a hair over budget.
    while shares > 0 && total_entry_cost(shares, price, config) > cash {
        shares -= 1;
    }
    shares
}

pub fn total_entry_cost(shares: u64, price: f64, config: &ExecutionConfig) -> f64 {
    let value = shares as f64 * price;
    value + calculate_commission(value, config)
}
