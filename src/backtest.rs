//! Historical replay through the live orchestrator.
//!
//! Each trading date becomes one cycle against a `ReplayDataPort` whose
//! cursor hides later bars. Positions still open after the last date are
//! closed at their last close with reason MANUAL.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use parking_lot::Mutex;
use tracing::info;

use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::memory_store::MemoryStore;
use crate::adapters::replay_adapter::ReplayDataPort;
use crate::domain::bar::PriceBar;
use crate::domain::error::SwingError;
use crate::domain::ledger::Ledger;
use crate::domain::metrics::Metrics;
use crate::domain::position::{ExitReason, Trade};
use crate::domain::settings::TradingConfig;
use crate::orchestrator::Orchestrator;
use crate::ports::ledger_store::LedgerStore;

#[derive(Debug, Clone, Default)]
pub struct BacktestOptions {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub risk_free_rate: f64,
}

#[derive(Debug, Clone)]
pub struct BacktestReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cycles: usize,
    pub final_equity: f64,
    pub trades: Vec<Trade>,
    pub metrics: Metrics,
}

/// Cycles are stamped at the ASX close.
fn cycle_time(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(16, 10, 0).unwrap_or(NaiveTime::MIN))
}

pub async fn run_backtest(
    config: Arc<TradingConfig>,
    histories: HashMap<String, Vec<PriceBar>>,
    options: &BacktestOptions,
) -> Result<BacktestReport, SwingError> {
    config.require_universe()?;

    let replay = Arc::new(ReplayDataPort::new(histories));
    let days: Vec<NaiveDate> = replay
        .trading_days()
        .into_iter()
        .filter(|d| options.start.is_none_or(|s| *d >= s))
        .filter(|d| options.end.is_none_or(|e| *d <= e))
        .collect();
    let (Some(&start), Some(&end)) = (days.first(), days.last()) else {
        return Err(SwingError::DataUnavailable {
            symbol: "*".to_string(),
            reason: "no trading days in the requested range".to_string(),
        });
    };

    let store = Arc::new(MemoryStore::new());
    let ledger = Ledger::load(store.clone(), config.starting_cash, config.execution.clone())?;
    let ledger = Arc::new(Mutex::new(ledger));
    let orchestrator = Orchestrator::new(
        config.clone(),
        replay.clone(),
        ledger.clone(),
        Arc::new(LogNotifier),
    );

    info!(%start, %end, days = days.len(), "backtest started");
    for day in &days {
        replay.set_cursor(*day);
        orchestrator.run_cycle(cycle_time(*day)).await?;
    }

    let final_equity = {
        let mut ledger = ledger.lock();
        liquidate(&mut ledger, &replay, cycle_time(end))?;
        let prices = HashMap::new();
        ledger.record_snapshot(cycle_time(end), &prices)?.equity
    };

    let trades = store.trades()?;
    let metrics = Metrics::compute(
        config.starting_cash,
        &store.positions()?,
        &trades,
        &store.snapshots()?,
        options.risk_free_rate,
    );
    info!(
        cycles = days.len(),
        final_equity,
        trades = trades.len(),
        "backtest finished"
    );

    Ok(BacktestReport {
        start,
        end,
        cycles: days.len(),
        final_equity,
        trades,
        metrics,
    })
}

fn liquidate(
    ledger: &mut Ledger,
    replay: &ReplayDataPort,
    timestamp: NaiveDateTime,
) -> Result<(), SwingError> {
    let open: Vec<(u64, String, u64, f64)> = ledger
        .state()
        .open_positions
        .values()
        .map(|p| (p.id, p.symbol.clone(), p.remaining_shares, p.entry_price))
        .collect();

    for (id, symbol, shares, entry) in open {
        let price = replay.last_close(&symbol).unwrap_or(entry);
        ledger.close_partial(id, shares, price, ExitReason::Manual, timestamp)?;
    }
    Ok(())
}
