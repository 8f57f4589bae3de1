//! SQLite adapter: price bars, the ledger tables and notifications.

use crate::domain::bar::PriceBar;
use crate::domain::error::SwingError;
use crate::domain::portfolio::EquitySnapshot;
use crate::domain::position::{Position, Trade};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::ledger_store::{AccountRow, LedgerChange, LedgerStore, StoredLedger};
use crate::ports::notify_port::{Notification, NotifyLevel, NotifyPort};
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS ohlcv (
        symbol TEXT NOT NULL,
        date TEXT NOT NULL,
        open REAL NOT NULL,
        high REAL NOT NULL,
        low REAL NOT NULL,
        close REAL NOT NULL,
        volume INTEGER NOT NULL DEFAULT 0,
        PRIMARY KEY (symbol, date)
    );
    CREATE TABLE IF NOT EXISTS account (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        starting_cash REAL NOT NULL,
        cash REAL NOT NULL,
        equity REAL NOT NULL,
        realized_pnl_total REAL NOT NULL,
        next_position_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS positions (
        id INTEGER PRIMARY KEY,
        symbol TEXT NOT NULL,
        open_timestamp TEXT NOT NULL,
        entry_price REAL NOT NULL,
        entry_commission REAL NOT NULL,
        total_shares INTEGER NOT NULL,
        remaining_shares INTEGER NOT NULL,
        stop_price REAL NOT NULL,
        target1_price REAL NOT NULL,
        target2_price REAL NOT NULL,
        target1_filled INTEGER NOT NULL,
        target1_date TEXT,
        status TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_positions_status ON positions(status);
    CREATE TABLE IF NOT EXISTS trades (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        position_id INTEGER NOT NULL REFERENCES positions(id),
        symbol TEXT NOT NULL,
        open_timestamp TEXT NOT NULL,
        close_timestamp TEXT NOT NULL,
        shares_closed INTEGER NOT NULL,
        entry_price REAL NOT NULL,
        exit_price REAL NOT NULL,
        exit_reason TEXT NOT NULL,
        realized_pnl REAL NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_trades_close ON trades(close_timestamp);
    CREATE TABLE IF NOT EXISTS equity_snapshots (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        equity REAL NOT NULL,
        cash REAL NOT NULL,
        positions_value REAL NOT NULL
    );
    CREATE TABLE IF NOT EXISTS notifications (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL
    );";

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn query_err(e: rusqlite::Error) -> SwingError {
    SwingError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err(column: usize, reason: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        reason.into(),
    )
}

fn parse_timestamp(row: &Row<'_>, column: usize) -> rusqlite::Result<NaiveDateTime> {
    let raw: String = row.get(column)?;
    NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT)
        .map_err(|e| conversion_err(column, format!("{raw}: {e}")))
}

fn parse_enum<T: std::str::FromStr<Err = String>>(row: &Row<'_>, column: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    raw.parse::<T>().map_err(|e| conversion_err(column, e))
}

fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

const POSITION_COLUMNS: &str = "id, symbol, open_timestamp, entry_price, entry_commission, total_shares,
     remaining_shares, stop_price, target1_price, target2_price, target1_filled, target1_date, status";

fn position_from_row(row: &Row<'_>) -> rusqlite::Result<Position> {
    Ok(Position {
        id: row.get::<_, i64>(0)? as u64,
        symbol: row.get(1)?,
        open_timestamp: parse_timestamp(row, 2)?,
        entry_price: row.get(3)?,
        entry_commission: row.get(4)?,
        total_shares: row.get::<_, i64>(5)? as u64,
        remaining_shares: row.get::<_, i64>(6)? as u64,
        stop_price: row.get(7)?,
        target1_price: row.get(8)?,
        target2_price: row.get(9)?,
        target1_filled: row.get::<_, i64>(10)? != 0,
        target1_date: parse_optional_date(row, 11)?,
        status: parse_enum(row, 12)?,
    })
}

fn parse_optional_date(row: &Row<'_>, column: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|r| {
        NaiveDate::parse_from_str(&r, DATE_FORMAT)
            .map_err(|e| conversion_err(column, format!("{r}: {e}")))
    })
    .transpose()
}

fn insert_snapshot(conn: &Connection, snapshot: &EquitySnapshot) -> Result<(), SwingError> {
    conn.execute(
        "INSERT INTO equity_snapshots (timestamp, equity, cash, positions_value)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            format_timestamp(&snapshot.timestamp),
            snapshot.equity,
            snapshot.cash,
            snapshot.positions_value
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

fn trade_from_row(row: &Row<'_>) -> rusqlite::Result<Trade> {
    Ok(Trade {
        position_id: row.get::<_, i64>(0)? as u64,
        symbol: row.get(1)?,
        open_timestamp: parse_timestamp(row, 2)?,
        close_timestamp: parse_timestamp(row, 3)?,
        shares_closed: row.get::<_, i64>(4)? as u64,
        entry_price: row.get(5)?,
        exit_price: row.get(6)?,
        exit_reason: parse_enum(row, 7)?,
        realized_pnl: row.get(8)?,
    })
}

fn write_account(tx: &Transaction<'_>, account: &AccountRow) -> Result<(), SwingError> {
    tx.execute(
        "INSERT INTO account (id, starting_cash, cash, equity, realized_pnl_total, next_position_id)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            starting_cash = excluded.starting_cash,
            cash = excluded.cash,
            equity = excluded.equity,
            realized_pnl_total = excluded.realized_pnl_total,
            next_position_id = excluded.next_position_id",
        params![
            account.starting_cash,
            account.cash,
            account.equity,
            account.realized_pnl_total,
            account.next_position_id as i64
        ],
    )
    .map_err(query_err)?;
    Ok(())
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SwingError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| SwingError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;
        Self::open(&db_path, pool_size)
    }

    pub fn open(db_path: &str, pool_size: u32) -> Result<Self, SwingError> {
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA busy_timeout = 5000;")
        });
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| SwingError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    pub fn in_memory() -> Result<Self, SwingError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| SwingError::Database {
                reason: e.to_string(),
            })?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, SwingError> {
        self.pool.get().map_err(|e: r2d2::Error| SwingError::Database {
            reason: e.to_string(),
        })
    }

    pub fn initialize_schema(&self) -> Result<(), SwingError> {
        self.conn()?.execute_batch(SCHEMA).map_err(query_err)
    }

    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, SwingError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, date, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    bar.symbol,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        Ok(bars.len())
    }

    /// Most recent notifications first.
    pub fn notifications(&self, limit: usize) -> Result<Vec<Notification>, SwingError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, level, message FROM notifications
                 ORDER BY id DESC LIMIT ?1",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(Notification {
                    timestamp: parse_timestamp(row, 0)?,
                    level: parse_enum(row, 1)?,
                    message: row.get(2)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    pub fn record_notification(&self, notification: &Notification) -> Result<(), SwingError> {
        self.conn()?
            .execute(
                "INSERT INTO notifications (timestamp, level, message) VALUES (?1, ?2, ?3)",
                params![
                    format_timestamp(&notification.timestamp),
                    notification.level.as_str(),
                    notification.message
                ],
            )
            .map_err(query_err)?;
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn get_bars(&self, symbol: &str, lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT symbol, date, open, high, low, close, volume FROM (
                    SELECT * FROM ohlcv WHERE symbol = ?1 ORDER BY date DESC LIMIT ?2
                 ) ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![symbol, i64::try_from(lookback).unwrap_or(i64::MAX)], |row| {
                let date_str: String = row.get(1)?;
                let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT)
                    .map_err(|e| conversion_err(1, format!("{date_str}: {e}")))?;
                Ok(PriceBar {
                    symbol: row.get(0)?,
                    date,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                })
            })
            .map_err(query_err)?;

        let bars = rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)?;
        if bars.is_empty() {
            return Err(SwingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no bars stored".to_string(),
            });
        }
        Ok(bars)
    }
}

impl LedgerStore for SqliteAdapter {
    fn load(&self) -> Result<Option<StoredLedger>, SwingError> {
        let conn = self.conn()?;
        let account = conn
            .query_row(
                "SELECT starting_cash, cash, equity, realized_pnl_total, next_position_id
                 FROM account WHERE id = 1",
                [],
                |row| {
                    Ok(AccountRow {
                        starting_cash: row.get(0)?,
                        cash: row.get(1)?,
                        equity: row.get(2)?,
                        realized_pnl_total: row.get(3)?,
                        next_position_id: row.get::<_, i64>(4)? as u64,
                    })
                },
            )
            .optional()
            .map_err(query_err)?;

        let Some(account) = account else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {POSITION_COLUMNS} FROM positions WHERE status != 'CLOSED' ORDER BY id"
            ))
            .map_err(query_err)?;
        let open_positions = stmt
            .query_map([], position_from_row)
            .map_err(query_err)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(query_err)?;

        Ok(Some(StoredLedger {
            account,
            open_positions,
        }))
    }

    fn commit(&self, change: &LedgerChange) -> Result<(), SwingError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        write_account(&tx, &change.account)?;

        if let Some(p) = &change.position {
            tx.execute(
                "INSERT INTO positions (id, symbol, open_timestamp, entry_price, entry_commission,
                    total_shares, remaining_shares, stop_price, target1_price, target2_price,
                    target1_filled, target1_date, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 ON CONFLICT(id) DO UPDATE SET
                    remaining_shares = excluded.remaining_shares,
                    stop_price = excluded.stop_price,
                    target1_filled = excluded.target1_filled,
                    target1_date = excluded.target1_date,
                    status = excluded.status",
                params![
                    p.id as i64,
                    p.symbol,
                    format_timestamp(&p.open_timestamp),
                    p.entry_price,
                    p.entry_commission,
                    p.total_shares as i64,
                    p.remaining_shares as i64,
                    p.stop_price,
                    p.target1_price,
                    p.target2_price,
                    p.target1_filled as i64,
                    p.target1_date.map(|d| d.format(DATE_FORMAT).to_string()),
                    p.status.as_str()
                ],
            )
            .map_err(query_err)?;
        }

        if let Some(t) = &change.trade {
            tx.execute(
                "INSERT INTO trades (position_id, symbol, open_timestamp, close_timestamp,
                    shares_closed, entry_price, exit_price, exit_reason, realized_pnl)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    t.position_id as i64,
                    t.symbol,
                    format_timestamp(&t.open_timestamp),
                    format_timestamp(&t.close_timestamp),
                    t.shares_closed as i64,
                    t.entry_price,
                    t.exit_price,
                    t.exit_reason.as_str(),
                    t.realized_pnl
                ],
            )
            .map_err(query_err)?;
        }

        if let Some(snapshot) = &change.snapshot {
            insert_snapshot(&tx, snapshot)?;
        }

        tx.commit().map_err(query_err)
    }

    fn append_snapshot(&self, snapshot: &EquitySnapshot) -> Result<(), SwingError> {
        insert_snapshot(&*self.conn()?, snapshot)
    }

    fn trades(&self) -> Result<Vec<Trade>, SwingError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT position_id, symbol, open_timestamp, close_timestamp, shares_closed,
                    entry_price, exit_price, exit_reason, realized_pnl
                 FROM trades ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt.query_map([], trade_from_row).map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn positions(&self) -> Result<Vec<Position>, SwingError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {POSITION_COLUMNS} FROM positions ORDER BY id"))
            .map_err(query_err)?;
        let rows = stmt.query_map([], position_from_row).map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn snapshots(&self) -> Result<Vec<EquitySnapshot>, SwingError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, equity, cash, positions_value
                 FROM equity_snapshots ORDER BY id",
            )
            .map_err(query_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(EquitySnapshot {
                    timestamp: parse_timestamp(row, 0)?,
                    equity: row.get(1)?,
                    cash: row.get(2)?,
                    positions_value: row.get(3)?,
                })
            })
            .map_err(query_err)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(query_err)
    }

    fn reset(&self, account: &AccountRow) -> Result<(), SwingError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;
        tx.execute_batch(
            "DELETE FROM trades;
             DELETE FROM positions;
             DELETE FROM equity_snapshots;
             DELETE FROM notifications;
             DELETE FROM account;",
        )
        .map_err(query_err)?;
        write_account(&tx, account)?;
        tx.commit().map_err(query_err)
    }
}

impl NotifyPort for SqliteAdapter {
    fn notify(&self, level: NotifyLevel, message: &str) -> Result<(), SwingError> {
        self.record_notification(&Notification {
            timestamp: chrono::Local::now().naive_local(),
            level,
            message: message.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::position::{ExitReason, PositionStatus};

    fn ts(day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 8, day)
            .unwrap()
            .and_hms_opt(16, 5, 0)
            .unwrap()
    }

    fn account(cash: f64, next_id: u64) -> AccountRow {
        AccountRow {
            starting_cash: 100_000.0,
            cash,
            equity: cash,
            realized_pnl_total: 0.0,
            next_position_id: next_id,
        }
    }

    fn position(id: u64, remaining: u64, status: PositionStatus) -> Position {
        Position {
            id,
            symbol: "BHP.AX".into(),
            open_timestamp: ts(1),
            entry_price: 40.0,
            entry_commission: 10.0,
            total_shares: 100,
            remaining_shares: remaining,
            stop_price: 38.0,
            target1_price: 44.0,
            target2_price: 48.0,
            target1_filled: remaining < 100,
            target1_date: (remaining < 100).then(|| NaiveDate::from_ymd_opt(2024, 8, 2).unwrap()),
            status,
        }
    }

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            symbol: "BHP.AX".into(),
            date: NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000,
        }
    }

    #[test]
    fn insert_and_get_bars_latest_window() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .insert_bars(&[bar(1, 40.0), bar(2, 41.0), bar(5, 42.0)])
            .unwrap();

        let bars = adapter.get_bars("BHP.AX", 2).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 41.0);
        assert_eq!(bars[1].close, 42.0);

        assert!(matches!(
            adapter.get_bars("CBA.AX", 10),
            Err(SwingError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn empty_store_loads_none() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        assert!(adapter.load().unwrap().is_none());
    }

    #[test]
    fn commit_round_trips_ledger_rows() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .commit(&LedgerChange {
                account: account(95_990.0, 2),
                position: Some(position(1, 100, PositionStatus::Open)),
                trade: None,
                snapshot: None,
            })
            .unwrap();

        let trade = Trade {
            position_id: 1,
            symbol: "BHP.AX".into(),
            open_timestamp: ts(1),
            close_timestamp: ts(3),
            shares_closed: 25,
            entry_price: 40.0,
            exit_price: 44.0,
            exit_reason: ExitReason::Target1,
            realized_pnl: 87.5,
        };
        adapter
            .commit(&LedgerChange {
                account: account(97_080.0, 2),
                position: Some(position(1, 75, PositionStatus::PartiallyClosed)),
                trade: Some(trade.clone()),
                snapshot: Some(EquitySnapshot {
                    timestamp: ts(3),
                    equity: 100_080.0,
                    cash: 97_080.0,
                    positions_value: 3_000.0,
                }),
            })
            .unwrap();

        let loaded = adapter.load().unwrap().unwrap();
        assert_eq!(loaded.account.cash, 97_080.0);
        assert_eq!(loaded.account.next_position_id, 2);
        assert_eq!(loaded.open_positions.len(), 1);
        assert_eq!(loaded.open_positions[0].remaining_shares, 75);
        assert!(loaded.open_positions[0].target1_filled);
        assert_eq!(
            loaded.open_positions[0].target1_date,
            NaiveDate::from_ymd_opt(2024, 8, 2)
        );
        assert_eq!(adapter.trades().unwrap(), vec![trade]);
        assert_eq!(adapter.snapshots().unwrap().len(), 1);

        adapter
            .commit(&LedgerChange {
                account: account(100_000.0, 2),
                position: Some(position(1, 0, PositionStatus::Closed)),
                trade: None,
                snapshot: None,
            })
            .unwrap();
        assert!(adapter.load().unwrap().unwrap().open_positions.is_empty());
        assert_eq!(adapter.positions().unwrap()[0].status, PositionStatus::Closed);
    }

    #[test]
    fn failed_commit_rolls_back() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .commit(&LedgerChange {
                account: account(100_000.0, 1),
                position: None,
                trade: None,
                snapshot: None,
            })
            .unwrap();

        // Make the trade insert fail after the account and position writes.
        adapter.conn().unwrap().execute_batch("DROP TABLE trades;").unwrap();
        let result = adapter.commit(&LedgerChange {
            account: account(1.0, 5),
            position: Some(position(1, 100, PositionStatus::Open)),
            trade: Some(Trade {
                position_id: 1,
                symbol: "BHP.AX".into(),
                open_timestamp: ts(1),
                close_timestamp: ts(2),
                shares_closed: 1,
                entry_price: 40.0,
                exit_price: 41.0,
                exit_reason: ExitReason::Manual,
                realized_pnl: 1.0,
            }),
            snapshot: None,
        });
        assert!(matches!(result, Err(SwingError::DatabaseQuery { .. })));

        let loaded = adapter.load().unwrap().unwrap();
        assert_eq!(loaded.account.cash, 100_000.0);
        assert!(loaded.open_positions.is_empty());
    }

    #[test]
    fn snapshots_and_notifications() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .append_snapshot(&EquitySnapshot {
                timestamp: ts(2),
                equity: 100_500.0,
                cash: 90_000.0,
                positions_value: 10_500.0,
            })
            .unwrap();
        assert_eq!(adapter.snapshots().unwrap()[0].positions_value, 10_500.0);

        adapter.notify(NotifyLevel::Info, "first").unwrap();
        adapter.notify(NotifyLevel::Alert, "second").unwrap();
        let notes = adapter.notifications(10).unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].message, "second");
        assert_eq!(notes[0].level, NotifyLevel::Alert);
        assert_eq!(adapter.notifications(1).unwrap().len(), 1);
    }

    #[test]
    fn reset_clears_everything() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter
            .commit(&LedgerChange {
                account: account(50_000.0, 2),
                position: Some(position(1, 100, PositionStatus::Open)),
                trade: None,
                snapshot: None,
            })
            .unwrap();
        adapter.notify(NotifyLevel::Warning, "note").unwrap();

        adapter.reset(&account(150_000.0, 1)).unwrap();
        let loaded = adapter.load().unwrap().unwrap();
        assert_eq!(loaded.account.cash, 150_000.0);
        assert!(loaded.open_positions.is_empty());
        assert!(adapter.positions().unwrap().is_empty());
        assert!(adapter.notifications(10).unwrap().is_empty());
    }

    #[test]
    fn file_database_persists_across_pools() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("swing.db");
        let path = path.to_str().unwrap();
        {
            let adapter = SqliteAdapter::open(path, 2).unwrap();
            adapter
                .commit(&LedgerChange {
                    account: account(75_000.0, 1),
                    position: None,
                    trade: None,
                    snapshot: None,
                })
                .unwrap();
        }
        let reopened = SqliteAdapter::open(path, 2).unwrap();
        assert_eq!(reopened.load().unwrap().unwrap().account.cash, 75_000.0);
    }
}
