//! One trading cycle: fetch, scan, size and open, monitor and close, snapshot.
//!
//! Fetch and scan fan out over a bounded worker pool. A worker holds its
//! permit until the blocking fetch returns, even after the cycle stopped
//! waiting for it, so a slow source never sees more than `max_workers`
//! requests at once across cycles. Everything that touches
//! the ledger runs afterwards on the calling task, one mutation at a time.
//! Cycles never overlap: a second `run_cycle` while one is in flight fails
//! with `SchedulerOverlap`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::domain::bar::{is_ordered, PriceBar};
use crate::domain::breaker::check_breaker;
use crate::domain::error::SwingError;
use crate::domain::indicator::ema::calculate_ema;
use crate::domain::ledger::Ledger;
use crate::domain::monitor::{evaluate, ratchet_stop};
use crate::domain::position::{Position, Trade};
use crate::domain::regime::{classify, Regime, REGIME_LOOKBACK};
use crate::domain::scanner::{rank_signals, scan, Signal};
use crate::domain::settings::TradingConfig;
use crate::domain::sizing::{size_signal, SizingError};
use crate::ports::data_port::DataPort;
use crate::ports::notify_port::{NotifyLevel, NotifyPort};

/// Outcome of one cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: NaiveDateTime,
    pub symbols_fetched: usize,
    pub symbols_skipped: Vec<String>,
    pub signals: Vec<Signal>,
    pub opened: Vec<Position>,
    pub trades: Vec<Trade>,
    pub equity: f64,
    pub regime: Option<Regime>,
    /// Why new entries were paused this cycle, if they were.
    pub entry_gate: Option<String>,
}

struct FetchResult {
    bars: HashMap<String, Vec<PriceBar>>,
    signals: Vec<Signal>,
    skipped: Vec<String>,
}

pub struct Orchestrator {
    config: Arc<TradingConfig>,
    data: Arc<dyn DataPort>,
    ledger: Arc<Mutex<Ledger>>,
    notifier: Arc<dyn NotifyPort>,
    workers: Arc<Semaphore>,
    in_flight: tokio::sync::Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        config: Arc<TradingConfig>,
        data: Arc<dyn DataPort>,
        ledger: Arc<Mutex<Ledger>>,
        notifier: Arc<dyn NotifyPort>,
    ) -> Self {
        let workers = Arc::new(Semaphore::new(config.scheduler.max_workers.max(1)));
        Self {
            config,
            data,
            ledger,
            notifier,
            workers,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Arc<Mutex<Ledger>> {
        &self.ledger
    }

    pub async fn run_cycle(&self, now: NaiveDateTime) -> Result<CycleReport, SwingError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SwingError::SchedulerOverlap)?;

        self.cycle(now)
            .instrument(info_span!("cycle", ts = %now))
            .await
    }

    /// Fetch and scan only. Ranked signals, no ledger changes.
    pub async fn scan_only(&self) -> Result<Vec<Signal>, SwingError> {
        let universe = self.config.require_universe()?;
        let fetched = self.fetch_and_scan(universe.symbols.clone()).await;
        let mut signals = fetched.signals;
        rank_signals(&mut signals);
        Ok(signals)
    }

    async fn cycle(&self, now: NaiveDateTime) -> Result<CycleReport, SwingError> {
        let universe = self.config.require_universe()?;
        let held = self.ledger.lock().state().held_symbols();
        let symbols = universe.fetch_list(&held);

        let mut fetched = self.fetch_and_scan(symbols).await;
        rank_signals(&mut fetched.signals);

        let regime = match &universe.regime_symbol {
            Some(symbol) => Some(self.regime(symbol).await),
            None => None,
        };

        let prices: HashMap<String, f64> = fetched
            .bars
            .iter()
            .filter_map(|(symbol, bars)| bars.last().map(|b| (symbol.clone(), b.close)))
            .collect();

        let entry_gate = self.entry_gate(now, &prices, regime)?;
        if let Some(reason) = &entry_gate {
            info!(%reason, "new entries paused");
            self.notify(NotifyLevel::Warning, &format!("Entries paused: {reason}"));
        }

        let opened = if entry_gate.is_none() {
            self.open_positions(&fetched.signals, &prices, now)?
        } else {
            Vec::new()
        };

        let trades = self.monitor_positions(&fetched.bars, now)?;

        let (snapshot, audit) = {
            let mut ledger = self.ledger.lock();
            let snapshot = ledger.record_snapshot(now, &prices)?;
            let audit = ledger.audit(&prices, snapshot.equity);
            (snapshot, audit)
        };
        if let Err(e) = audit {
            error!(error = %e, "equity invariant violated after cycle");
            self.notify(NotifyLevel::Alert, &format!("Ledger audit failed: {e}"));
            return Err(e);
        }

        info!(
            fetched = fetched.bars.len(),
            skipped = fetched.skipped.len(),
            signals = fetched.signals.len(),
            opened = opened.len(),
            trades = trades.len(),
            equity = snapshot.equity,
            "cycle complete"
        );

        Ok(CycleReport {
            timestamp: now,
            symbols_fetched: fetched.bars.len(),
            symbols_skipped: fetched.skipped,
            signals: fetched.signals,
            opened,
            trades,
            equity: snapshot.equity,
            regime,
            entry_gate,
        })
    }

    /// Held symbols outside the universe are fetched for pricing only.
    async fn fetch_and_scan(&self, symbols: Vec<String>) -> FetchResult {
        let lookback = self.config.scanner.lookback_bars;
        let timeout = self.config.scheduler.fetch_timeout;
        let scannable: HashSet<&String> = self.config.universe.symbols.iter().collect();

        let mut tasks = JoinSet::new();
        let mut names: HashMap<tokio::task::Id, String> = HashMap::new();
        for symbol in symbols {
            let workers = self.workers.clone();
            let data = self.data.clone();
            let config = self.config.clone();
            let should_scan = scannable.contains(&symbol);

            let name = symbol.clone();
            let handle = tasks.spawn(async move {
                let Ok(permit) = workers.acquire_owned().await else {
                    return (symbol, Err("worker pool closed".to_string()));
                };

                let name = symbol.clone();
                let work = tokio::task::spawn_blocking(
                    move || -> Result<(Vec<PriceBar>, Option<Signal>), SwingError> {
                        let _permit = permit;
                        let bars = data.get_bars(&name, lookback)?;
                        if !is_ordered(&bars) {
                            return Err(SwingError::DataUnavailable {
                                symbol: name,
                                reason: "bars out of order or duplicated".to_string(),
                            });
                        }
                        let signal = if should_scan {
                            scan(&bars, &config.scanner)
                        } else {
                            None
                        };
                        Ok((bars, signal))
                    },
                );

                let outcome = match tokio::time::timeout(timeout, work).await {
                    Ok(Ok(Ok(result))) => Ok(result),
                    Ok(Ok(Err(e))) => Err(e.to_string()),
                    Ok(Err(join)) => Err(format!("worker failed: {join}")),
                    Err(_) => Err(format!("fetch timed out after {:?}", timeout)),
                };
                (symbol, outcome)
            });
            names.insert(handle.id(), name);
        }

        let mut result = FetchResult {
            bars: HashMap::new(),
            signals: Vec::new(),
            skipped: Vec::new(),
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((symbol, Ok((bars, signal)))) => {
                    if let Some(signal) = signal {
                        debug!(symbol = %symbol, trigger = signal.trigger_price, "signal");
                        result.signals.push(signal);
                    }
                    result.bars.insert(symbol, bars);
                }
                Ok((symbol, Err(reason))) => {
                    warn!(symbol = %symbol, %reason, "skipping symbol this cycle");
                    result.skipped.push(symbol);
                }
                Err(e) => {
                    let symbol = names.remove(&e.id()).unwrap_or_default();
                    error!(symbol = %symbol, error = %e, "fetch task failed");
                    if !symbol.is_empty() {
                        result.skipped.push(symbol);
                    }
                }
            }
        }
        result.skipped.sort();
        result
    }

    async fn regime(&self, symbol: &str) -> Regime {
        let Ok(permit) = self.workers.clone().acquire_owned().await else {
            warn!(symbol, "regime index unavailable");
            return Regime::Unknown;
        };
        let data = self.data.clone();
        let name = symbol.to_string();
        let work = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            data.get_bars(&name, REGIME_LOOKBACK)
        });
        match tokio::time::timeout(self.config.scheduler.fetch_timeout, work).await {
            Ok(Ok(Ok(bars))) => {
                let regime = classify(&bars);
                debug!(symbol, regime = %regime, "market regime");
                regime
            }
            _ => {
                warn!(symbol, "regime index unavailable");
                Regime::Unknown
            }
        }
    }

    fn entry_gate(
        &self,
        now: NaiveDateTime,
        prices: &HashMap<String, f64>,
        regime: Option<Regime>,
    ) -> Result<Option<String>, SwingError> {
        if !self.config.scheduler.auto_trade {
            return Ok(Some("auto-trade disabled".to_string()));
        }

        let ledger = self.ledger.lock();
        let trades = ledger.store().trades()?;
        let equity = ledger.equity(prices);
        if let Some(trip) = check_breaker(
            ledger.state().starting_cash,
            equity,
            &trades,
            now.date(),
            &self.config.risk,
        ) {
            return Ok(Some(format!("circuit breaker: {trip}")));
        }

        match regime {
            Some(r) if !r.allows_entries() => Ok(Some(format!("market regime {r}"))),
            _ => Ok(None),
        }
    }

    fn open_positions(
        &self,
        signals: &[Signal],
        prices: &HashMap<String, f64>,
        now: NaiveDateTime,
    ) -> Result<Vec<Position>, SwingError> {
        let mut ledger = self.ledger.lock();
        let equity = ledger.equity(prices);
        let mut opened = Vec::new();

        for signal in signals {
            let order = match size_signal(
                signal,
                ledger.state(),
                equity,
                &self.config.risk,
                &self.config.execution,
            ) {
                Ok(order) => order,
                Err(e @ SizingError::AlreadyHolding(_)) => {
                    debug!(symbol = %signal.symbol, reason = %e, "signal dropped");
                    continue;
                }
                Err(e) => {
                    info!(symbol = %signal.symbol, reason = %e, "signal dropped");
                    continue;
                }
            };

            match ledger.open(&order, now) {
                Ok(position) => {
                    self.notify(
                        NotifyLevel::Info,
                        &format!(
                            "Opened #{} {} {} @ {:.3} stop {:.3} targets {:.3}/{:.3}",
                            position.id,
                            position.symbol,
                            position.total_shares,
                            position.entry_price,
                            position.stop_price,
                            position.target1_price,
                            position.target2_price
                        ),
                    );
                    opened.push(position);
                }
                Err(e) if e.is_recoverable() => {
                    warn!(symbol = %order.symbol, error = %e, "open rejected");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(opened)
    }

    fn monitor_positions(
        &self,
        bars: &HashMap<String, Vec<PriceBar>>,
        now: NaiveDateTime,
    ) -> Result<Vec<Trade>, SwingError> {
        let mut ledger = self.ledger.lock();
        let ids: Vec<u64> = ledger.state().open_positions.keys().copied().collect();
        let mut trades = Vec::new();

        for id in ids {
            let Some(position) = ledger.state().get_position(id).cloned() else {
                continue;
            };
            let Some(history) = bars.get(&position.symbol) else {
                warn!(position_id = id, symbol = %position.symbol, "no price for open position");
                continue;
            };
            let Some(bar) = history.last() else {
                continue;
            };
            // The entry bar was already consumed at the close.
            if bar.date <= position.open_timestamp.date() {
                continue;
            }

            // Stops move on what was known before this bar opened.
            let prior_fast = history.len().checked_sub(2).and_then(|i| {
                calculate_ema(history, self.config.scanner.fast_period).value_at(i)
            });
            let position = match ratchet_stop(&position, bar.date, prior_fast, &self.config.monitor) {
                Some(stop) => ledger.adjust_stop(id, stop)?,
                None => position,
            };

            for exit in evaluate(&position, bar, &self.config.monitor) {
                let trade = ledger.apply_exit(&exit, now)?;
                self.notify(
                    NotifyLevel::Info,
                    &format!(
                        "Closed {} {} of #{} @ {:.3} ({}) pnl {:.2}",
                        trade.shares_closed,
                        trade.symbol,
                        trade.position_id,
                        trade.exit_price,
                        trade.exit_reason,
                        trade.realized_pnl
                    ),
                );
                trades.push(trade);
            }
        }
        Ok(trades)
    }

    fn notify(&self, level: NotifyLevel, message: &str) {
        if let Err(e) = self.notifier.notify(level, message) {
            warn!(error = %e, "notification failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::log_notifier::LogNotifier;
    use crate::adapters::memory_store::MemoryStore;
    use crate::domain::universe::Universe;
    use chrono::NaiveDate;

    struct StaticPort(HashMap<String, Vec<PriceBar>>);

    impl DataPort for StaticPort {
        fn get_bars(&self, symbol: &str, _lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
            self.0
                .get(symbol)
                .cloned()
                .ok_or_else(|| SwingError::DataUnavailable {
                    symbol: symbol.into(),
                    reason: "unknown".into(),
                })
        }
    }

    struct PanickingPort;

    impl DataPort for PanickingPort {
        fn get_bars(&self, symbol: &str, _lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
            panic!("feed for {symbol} crashed");
        }
    }

    fn flat(symbol: &str, n: usize) -> Vec<PriceBar> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        (0..n)
            .map(|i| PriceBar {
                symbol: symbol.into(),
                date: start + chrono::Duration::days(i as i64),
                open: 10.0,
                high: 10.5,
                low: 9.5,
                close: 10.0,
                volume: 100,
            })
            .collect()
    }

    fn orchestrator(auto_trade: bool) -> Orchestrator {
        let mut config = TradingConfig::default();
        config.universe = Universe {
            symbols: vec!["BHP.AX".into(), "CBA.AX".into()],
            regime_symbol: None,
        };
        config.scheduler.auto_trade = auto_trade;

        let mut data = HashMap::new();
        data.insert("BHP.AX".to_string(), flat("BHP.AX", 60));
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::load(store, config.starting_cash, config.execution.clone()).unwrap();
        Orchestrator::new(
            Arc::new(config),
            Arc::new(StaticPort(data)),
            Arc::new(Mutex::new(ledger)),
            Arc::new(LogNotifier),
        )
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(16, 10, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn failed_symbol_is_skipped() {
        let report = orchestrator(true).run_cycle(now()).await.unwrap();
        assert_eq!(report.symbols_fetched, 1);
        assert_eq!(report.symbols_skipped, vec!["CBA.AX".to_string()]);
        assert!(report.signals.is_empty());
        assert_eq!(report.equity, 150_000.0);
    }

    #[tokio::test]
    async fn crashed_worker_still_reports_its_symbol() {
        let mut config = TradingConfig::default();
        config.universe = Universe {
            symbols: vec!["CBA.AX".into(), "BHP.AX".into()],
            regime_symbol: None,
        };
        let store = Arc::new(MemoryStore::new());
        let ledger = Ledger::load(store, config.starting_cash, config.execution.clone()).unwrap();
        let orch = Orchestrator::new(
            Arc::new(config),
            Arc::new(PanickingPort),
            Arc::new(Mutex::new(ledger)),
            Arc::new(LogNotifier),
        );

        let report = orch.run_cycle(now()).await.unwrap();
        assert_eq!(report.symbols_fetched, 0);
        assert_eq!(
            report.symbols_skipped,
            vec!["BHP.AX".to_string(), "CBA.AX".to_string()]
        );
    }

    #[tokio::test]
    async fn auto_trade_off_pauses_entries() {
        let report = orchestrator(false).run_cycle(now()).await.unwrap();
        assert_eq!(report.entry_gate.as_deref(), Some("auto-trade disabled"));
    }

    #[tokio::test]
    async fn every_cycle_records_one_snapshot() {
        let orch = orchestrator(true);
        orch.run_cycle(now()).await.unwrap();
        orch.run_cycle(now()).await.unwrap();
        let snapshots = orch.ledger().lock().store().snapshots().unwrap();
        assert_eq!(snapshots.len(), 2);
    }

    #[tokio::test]
    async fn empty_universe_is_config_error() {
        let store = Arc::new(MemoryStore::new());
        let config = TradingConfig::default();
        let ledger = Ledger::load(store, config.starting_cash, config.execution.clone()).unwrap();
        let orch = Orchestrator::new(
            Arc::new(config),
            Arc::new(StaticPort(HashMap::new())),
            Arc::new(Mutex::new(ledger)),
            Arc::new(LogNotifier),
        );
        assert!(matches!(
            orch.run_cycle(now()).await,
            Err(SwingError::ConfigMissing { .. })
        ));
    }
}
