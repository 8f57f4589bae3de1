#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swingtrader::adapters::log_notifier::LogNotifier;
use swingtrader::domain::bar::PriceBar;
use swingtrader::domain::error::SwingError;
use swingtrader::domain::ledger::Ledger;
use swingtrader::domain::settings::TradingConfig;
use swingtrader::domain::universe::Universe;
use swingtrader::orchestrator::Orchestrator;
use swingtrader::ports::data_port::DataPort;
use swingtrader::ports::ledger_store::LedgerStore;

/// Data port backed by in-memory series that tests can extend between
/// cycles. Symbols can be made to fail or to respond slowly.
pub struct MockDataPort {
    pub data: Mutex<HashMap<String, Vec<PriceBar>>>,
    pub errors: HashMap<String, String>,
    pub delays: HashMap<String, Duration>,
    pub calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(HashMap::new()),
            errors: HashMap::new(),
            delays: HashMap::new(),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn with_bars(self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.data.lock().insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    pub fn with_delay(mut self, symbol: &str, delay: Duration) -> Self {
        self.delays.insert(symbol.to_string(), delay);
        self
    }

    /// Appends a bar dated the day after the symbol's last bar.
    pub fn push_bar(&self, symbol: &str, high: f64, low: f64, close: f64) {
        let mut data = self.data.lock();
        let series = data.entry(symbol.to_string()).or_default();
        let date = series
            .last()
            .map(|b| b.date + chrono::Duration::days(1))
            .unwrap_or_else(|| date(2024, 1, 1));
        series.push(bar(symbol, date, high, low, close));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most requests that were ever inside `get_bars` at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl DataPort for MockDataPort {
    fn get_bars(&self, symbol: &str, lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(symbol) {
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(active, Ordering::SeqCst);
            std::thread::sleep(*delay);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
        if let Some(reason) = self.errors.get(symbol) {
            return Err(SwingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            });
        }
        let data = self.data.lock();
        let bars = data
            .get(symbol)
            .filter(|b| !b.is_empty())
            .ok_or_else(|| SwingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no data".to_string(),
            })?;
        let start = bars.len().saturating_sub(lookback);
        Ok(bars[start..].to_vec())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at_close(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(16, 10, 0).unwrap()
}

pub fn bar(symbol: &str, date: NaiveDate, high: f64, low: f64, close: f64) -> PriceBar {
    PriceBar {
        symbol: symbol.to_string(),
        date,
        open: close,
        high,
        low,
        close,
        volume: 10_000,
    }
}

/// Steady climb from 10.00, a five-bar pullback with long lower wicks, then
/// a bar that reclaims the fast EMA. The last bar triggers an entry at
/// 13.75 with swing range 10.55..13.95 and the stop on the slow EMA (~13.19).
pub fn pullback_bars(symbol: &str) -> Vec<PriceBar> {
    let start = date(2024, 1, 1);
    let mut rows = Vec::new();
    for i in 0..40 {
        let x = 10.0 + 0.1 * i as f64;
        rows.push((x + 0.05, x - 0.05, x));
    }
    for j in 1..=5 {
        let x = 13.9 - 0.12 * j as f64;
        rows.push((x + 0.05, x - 0.05 - 0.35 * j as f64, x));
    }
    let prev = 13.3;
    let x = prev + 0.45;
    rows.push((x + 0.6, prev - 0.02, x));

    rows.into_iter()
        .enumerate()
        .map(|(i, (high, low, close))| {
            bar(symbol, start + chrono::Duration::days(i as i64), high, low, close)
        })
        .collect()
}

pub const PULLBACK_TRIGGER: f64 = 13.75;
pub const PULLBACK_TARGET1: f64 = 13.75 + 3.4 * 0.272;
pub const PULLBACK_TARGET2: f64 = 13.75 + 3.4 * 0.618;

/// Flat series that never signals.
pub fn flat_bars(symbol: &str, count: usize, price: f64) -> Vec<PriceBar> {
    let start = date(2024, 1, 1);
    (0..count)
        .map(|i| {
            bar(
                symbol,
                start + chrono::Duration::days(i as i64),
                price + 0.1,
                price - 0.1,
                price,
            )
        })
        .collect()
}

/// Monotonic decline, classified BEAR once EMA200 is warm.
pub fn falling_bars(symbol: &str, count: usize) -> Vec<PriceBar> {
    let start = date(2023, 1, 1);
    (0..count)
        .map(|i| {
            let close = 8000.0 - 2.0 * i as f64;
            bar(symbol, start + chrono::Duration::days(i as i64), close, close, close)
        })
        .collect()
}

/// Default settings with zero slippage so entries fill at the trigger.
pub fn trading_config(symbols: &[&str]) -> TradingConfig {
    let mut config = TradingConfig::default();
    config.execution.slippage_pct = 0.0;
    config.universe = Universe {
        symbols: symbols.iter().map(|s| s.to_string()).collect(),
        regime_symbol: None,
    };
    config
}

pub fn orchestrator_with(
    config: TradingConfig,
    data: Arc<dyn DataPort>,
    store: Arc<dyn LedgerStore>,
) -> Orchestrator {
    let ledger = Ledger::load(store, config.starting_cash, config.execution.clone()).unwrap();
    Orchestrator::new(
        Arc::new(config),
        data,
        Arc::new(Mutex::new(ledger)),
        Arc::new(LogNotifier),
    )
}

/// `cash + Σ remaining × price` with entry price as the fallback mark.
pub fn marked_equity(ledger: &Ledger, prices: &HashMap<String, f64>) -> f64 {
    let state = ledger.state();
    state.cash
        + state
            .open_positions
            .values()
            .map(|p| p.remaining_shares as f64 * prices.get(&p.symbol).copied().unwrap_or(p.entry_price))
            .sum::<f64>()
}
