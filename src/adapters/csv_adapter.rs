//! CSV file data adapter.
//!
//! One file per symbol, `<dir>/<SYMBOL>.csv`, with a header row naming at
//! least `date,open,high,low,close`. `volume` and extra columns such as
//! `adj close` are optional. Header names are matched case-insensitively.

use crate::domain::bar::{tail, PriceBar};
use crate::domain::error::SwingError;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;

pub struct CsvAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", symbol))
    }

    /// Full history for `symbol`, oldest first, duplicate dates collapsed to
    /// the last row seen.
    pub fn load_history(&self, symbol: &str) -> Result<Vec<PriceBar>, SwingError> {
        let unavailable = |reason: String| SwingError::DataUnavailable {
            symbol: symbol.to_string(),
            reason,
        };

        let path = self.csv_path(symbol);
        let content = fs::read_to_string(&path)
            .map_err(|e| unavailable(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| unavailable(format!("CSV header error: {}", e)))?
            .clone();
        let columns = Columns::locate(&headers).map_err(unavailable)?;

        let mut bars: Vec<PriceBar> = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| unavailable(format!("CSV parse error: {}", e)))?;
            let bar = columns
                .parse(symbol, &record)
                .map_err(|reason| unavailable(format!("row {}: {}", line + 1, reason)))?;
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.date);
        bars.dedup_by(|later, earlier| {
            if later.date == earlier.date {
                std::mem::swap(later, earlier);
                true
            } else {
                false
            }
        });

        if bars.is_empty() {
            return Err(unavailable("no rows".to_string()));
        }
        Ok(bars)
    }

    pub fn list_symbols(&self) -> Result<Vec<String>, SwingError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "csv") {
                if let Some(stem) = path.file_stem() {
                    symbols.push(stem.to_string_lossy().to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Result<Self, String> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.eq_ignore_ascii_case(name))
        };
        let required = |name: &str| find(name).ok_or_else(|| format!("missing {} column", name));

        Ok(Columns {
            date: required("date")?,
            open: required("open")?,
            high: required("high")?,
            low: required("low")?,
            close: required("close")?,
            volume: find("volume"),
        })
    }

    fn parse(&self, symbol: &str, record: &csv::StringRecord) -> Result<PriceBar, String> {
        let field = |index: usize, name: &str| {
            record
                .get(index)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| format!("missing {} value", name))
        };
        let number = |index: usize, name: &str| -> Result<f64, String> {
            field(index, name)?
                .parse::<f64>()
                .map_err(|e| format!("invalid {} value: {}", name, e))
        };

        let date = NaiveDate::parse_from_str(field(self.date, "date")?, "%Y-%m-%d")
            .map_err(|e| format!("invalid date format: {}", e))?;

        let volume = match self.volume.and_then(|i| record.get(i)).filter(|v| !v.is_empty()) {
            Some(raw) => raw
                .parse::<f64>()
                .map(|v| v as i64)
                .map_err(|e| format!("invalid volume value: {}", e))?,
            None => 0,
        };

        Ok(PriceBar {
            symbol: symbol.to_string(),
            date,
            open: number(self.open, "open")?,
            high: number(self.high, "high")?,
            low: number(self.low, "low")?,
            close: number(self.close, "close")?,
            volume,
        })
    }
}

impl DataPort for CsvAdapter {
    fn get_bars(&self, symbol: &str, lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
        Ok(tail(self.load_history(symbol)?, lookback))
    }
}
