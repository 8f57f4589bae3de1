//! Periodic driver for the orchestrator.
//!
//! Runs a cycle, sleeps for the configured interval, repeats. A stop request
//! is only observed between cycles, so an in-flight cycle always completes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::domain::error::SwingError;
use crate::orchestrator::Orchestrator;

/// Sender half of the stop signal.
#[derive(Clone)]
pub struct StopHandle(Arc<watch::Sender<bool>>);

impl StopHandle {
    pub fn stop(&self) {
        // No receivers left means the loop already exited.
        let _ = self.0.send(true);
    }
}

pub fn stop_channel() -> (StopHandle, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    (StopHandle(Arc::new(tx)), rx)
}

pub struct Scheduler {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    clock: fn() -> NaiveDateTime,
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

impl Scheduler {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            clock: local_now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    /// Loops until `stop` flips to true or its sender is dropped. Returns the
    /// number of cycles that ran.
    pub async fn run(&self, mut stop: watch::Receiver<bool>) -> usize {
        let mut cycles = 0;
        info!(interval_secs = self.interval.as_secs(), "scheduler started");

        loop {
            if *stop.borrow() {
                break;
            }

            match self.orchestrator.run_cycle((self.clock)()).await {
                Ok(report) => info!(
                    opened = report.opened.len(),
                    trades = report.trades.len(),
                    equity = report.equity,
                    "scheduled cycle finished"
                ),
                Err(SwingError::SchedulerOverlap) => warn!("previous cycle still running"),
                Err(e) => error!(error = %e, "scheduled cycle failed"),
            }
            cycles += 1;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }

        info!(cycles, "scheduler stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::log_notifier::LogNotifier;
    use crate::adapters::memory_store::MemoryStore;
    use crate::domain::bar::PriceBar;
    use crate::domain::ledger::Ledger;
    use crate::domain::settings::TradingConfig;
    use crate::domain::universe::Universe;
    use crate::ports::data_port::DataPort;
    use chrono::NaiveDate;
    use parking_lot::Mutex;

    struct EmptyPort;

    impl DataPort for EmptyPort {
        fn get_bars(&self, symbol: &str, _lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
            Err(SwingError::DataUnavailable {
                symbol: symbol.into(),
                reason: "offline".into(),
            })
        }
    }

    fn fixed_clock() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 2)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn orchestrator() -> Arc<Orchestrator> {
        let mut config = TradingConfig::default();
        config.universe = Universe {
            symbols: vec!["BHP.AX".into()],
            regime_symbol: None,
        };
        let ledger = Ledger::load(
            Arc::new(MemoryStore::new()),
            config.starting_cash,
            config.execution.clone(),
        )
        .unwrap();
        Arc::new(Orchestrator::new(
            Arc::new(config),
            Arc::new(EmptyPort),
            Arc::new(Mutex::new(ledger)),
            Arc::new(LogNotifier),
        ))
    }

    #[tokio::test]
    async fn stopped_before_start_runs_nothing() {
        let scheduler = Scheduler::new(orchestrator(), Duration::from_secs(3600));
        let (handle, rx) = stop_channel();
        handle.stop();
        assert_eq!(scheduler.run(rx).await, 0);
    }

    #[tokio::test]
    async fn stop_during_sleep_ends_loop() {
        let orch = orchestrator();
        let scheduler = Scheduler::new(orch.clone(), Duration::from_secs(3600)).with_clock(fixed_clock);
        let (handle, rx) = stop_channel();

        let task = tokio::spawn(async move { scheduler.run(rx).await });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.stop();

        let cycles = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(orch.ledger().lock().store().snapshots().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repeats_every_interval() {
        let scheduler =
            Scheduler::new(orchestrator(), Duration::from_millis(10)).with_clock(fixed_clock);
        let (handle, rx) = stop_channel();
        let task = tokio::spawn(async move { scheduler.run(rx).await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.stop();
        let cycles = task.await.unwrap();
        assert!(cycles >= 2);
    }
}
