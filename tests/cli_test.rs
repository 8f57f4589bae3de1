//! Command dispatch against real files: INI config, CSV prices and a
//! SQLite ledger in a temp directory.

mod common;

use common::*;
use std::fs;
use std::path::Path;
use swingtrader::adapters::file_config_adapter::FileConfigAdapter;
use swingtrader::adapters::sqlite_adapter::SqliteAdapter;
use swingtrader::cli::{execute, load_config, Command};
use swingtrader::domain::bar::PriceBar;
use swingtrader::domain::error::SwingError;
use swingtrader::ports::data_port::DataPort;
use swingtrader::ports::ledger_store::LedgerStore;
use tempfile::TempDir;

fn write_csv(dir: &Path, symbol: &str, bars: &[PriceBar]) {
    let mut content = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        content.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date, b.open, b.high, b.low, b.close, b.volume
        ));
    }
    fs::write(dir.join(format!("{symbol}.csv")), content).unwrap();
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("prices")).unwrap();
        write_csv(&dir.path().join("prices"), "BHP.AX", &pullback_bars("BHP.AX"));
        Workspace { dir }
    }

    fn db_path(&self) -> String {
        self.dir.path().join("ledger.db").to_string_lossy().to_string()
    }

    fn prices_dir(&self) -> String {
        self.dir.path().join("prices").to_string_lossy().to_string()
    }

    /// Writes the INI with CSV prices unless `extra` sets its own [data].
    fn config(&self, extra: &str) -> FileConfigAdapter {
        let data = if extra.contains("[data]") {
            String::new()
        } else {
            format!("[data]\ncsv_dir = {}\n", self.prices_dir())
        };
        let content = format!(
            "[portfolio]\nstarting_cash = 150000\nslippage_pct = 0\n\n\
             [universe]\nsymbols = BHP.AX\n\n\
             [sqlite]\npath = {}\n\n{}\n{}",
            self.db_path(),
            data,
            extra
        );
        let path = self.dir.path().join("swingtrader.ini");
        fs::write(&path, content).unwrap();
        load_config(&path).unwrap()
    }

    fn store(&self) -> SqliteAdapter {
        SqliteAdapter::open(&self.db_path(), 1).unwrap()
    }
}

#[test]
fn cycle_command_opens_and_persists_position() {
    let ws = Workspace::new();
    let config = ws.config("");

    execute(&config, Command::Cycle).unwrap();

    let store = ws.store();
    let positions = store.positions().unwrap();
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].symbol, "BHP.AX");
    assert_eq!(store.snapshots().unwrap().len(), 1);
    assert!(!store.notifications(10).unwrap().is_empty());
}

#[test]
fn close_command_records_manual_trade() {
    let ws = Workspace::new();
    let config = ws.config("");
    execute(&config, Command::Cycle).unwrap();
    let id = ws.store().positions().unwrap()[0].id;

    execute(&config, Command::Close { id, price: 14.0 }).unwrap();

    let trades = ws.store().trades().unwrap();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].exit_reason.as_str(), "MANUAL");
    assert!(matches!(
        execute(&config, Command::Close { id, price: 14.0 }),
        Err(SwingError::UnknownPosition { .. })
    ));
}

#[test]
fn inspection_commands_succeed_on_fresh_ledger() {
    let ws = Workspace::new();
    let config = ws.config("");

    execute(&config, Command::Status).unwrap();
    execute(&config, Command::Positions { all: true }).unwrap();
    execute(&config, Command::Trades { limit: None }).unwrap();
    execute(&config, Command::Equity { limit: Some(5) }).unwrap();
    execute(&config, Command::Stats { risk_free_rate: 0.0 }).unwrap();
    execute(&config, Command::Notifications { limit: 5 }).unwrap();
    execute(&config, Command::Settings).unwrap();
    execute(&config, Command::Scan).unwrap();
}

#[test]
fn reset_requires_confirmation() {
    let ws = Workspace::new();
    let config = ws.config("");
    execute(&config, Command::Cycle).unwrap();

    assert!(execute(&config, Command::Reset { yes: false }).is_err());
    assert_eq!(ws.store().positions().unwrap().len(), 1);

    execute(&config, Command::Reset { yes: true }).unwrap();
    assert!(ws.store().positions().unwrap().is_empty());
}

#[test]
fn invalid_setting_is_rejected_before_anything_runs() {
    let ws = Workspace::new();
    let config = ws.config("[risk]\nrisk_pct = -1\n");

    match execute(&config, Command::Status) {
        Err(SwingError::ConfigInvalid { section, key, .. }) => {
            assert_eq!(section, "risk");
            assert_eq!(key, "risk_pct");
        }
        other => panic!("expected ConfigInvalid, got {other:?}"),
    }
}

#[test]
fn missing_sqlite_path_is_reported() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("swingtrader.ini");
    fs::write(&path, "[universe]\nsymbols = BHP.AX\n").unwrap();
    let config = load_config(&path).unwrap();

    assert!(matches!(
        execute(&config, Command::Status),
        Err(SwingError::ConfigMissing { .. })
    ));
}

#[test]
fn import_loads_prices_into_sqlite() {
    let ws = Workspace::new();
    let config = ws.config("[data]\ncsv_dir =\n");

    execute(
        &config,
        Command::Import {
            dir: ws.dir.path().join("prices"),
        },
    )
    .unwrap();

    let bars = ws.store().get_bars("BHP.AX", 10).unwrap();
    assert_eq!(bars.len(), 10);
    assert_eq!(bars.last().unwrap().date, date(2024, 2, 15));

    // With no csv_dir the cycle reads the imported table.
    execute(&config, Command::Cycle).unwrap();
    assert_eq!(ws.store().positions().unwrap().len(), 1);
}

#[test]
fn backtest_command_replays_csv_history() {
    let ws = Workspace::new();
    let config = ws.config("");

    execute(
        &config,
        Command::Backtest {
            start: None,
            end: None,
            risk_free_rate: 0.0,
        },
    )
    .unwrap();

    // Backtests never touch the persistent ledger.
    assert!(ws.store().positions().unwrap().is_empty());
}
