//! Historical replay data source.
//!
//! Holds full per-symbol histories and answers `get_bars` as if today were
//! the cursor date, hiding every later bar.

use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use parking_lot::RwLock;

use crate::domain::bar::PriceBar;
use crate::domain::error::SwingError;
use crate::ports::data_port::DataPort;

pub struct ReplayDataPort {
    histories: HashMap<String, Vec<PriceBar>>,
    cursor: RwLock<NaiveDate>,
}

impl ReplayDataPort {
    /// Histories must be ordered oldest first. The cursor starts on the
    /// earliest date present.
    pub fn new(histories: HashMap<String, Vec<PriceBar>>) -> Self {
        let start = histories
            .values()
            .filter_map(|bars| bars.first().map(|b| b.date))
            .min()
            .unwrap_or(NaiveDate::MIN);
        Self {
            histories,
            cursor: RwLock::new(start),
        }
    }

    pub fn set_cursor(&self, date: NaiveDate) {
        *self.cursor.write() = date;
    }

    pub fn cursor(&self) -> NaiveDate {
        *self.cursor.read()
    }

    /// Every date on which at least one symbol traded, ascending.
    pub fn trading_days(&self) -> Vec<NaiveDate> {
        let days: BTreeSet<NaiveDate> = self
            .histories
            .values()
            .flat_map(|bars| bars.iter().map(|b| b.date))
            .collect();
        days.into_iter().collect()
    }

    /// Last close at or before the cursor.
    pub fn last_close(&self, symbol: &str) -> Option<f64> {
        let cursor = self.cursor();
        self.histories
            .get(symbol)?
            .iter()
            .take_while(|b| b.date <= cursor)
            .last()
            .map(|b| b.close)
    }
}

impl DataPort for ReplayDataPort {
    fn get_bars(&self, symbol: &str, lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
        let cursor = self.cursor();
        let bars = self
            .histories
            .get(symbol)
            .ok_or_else(|| SwingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: "no history loaded".to_string(),
            })?;

        let visible = bars.partition_point(|b| b.date <= cursor);
        if visible == 0 {
            return Err(SwingError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: format!("no bars on or before {}", cursor),
            });
        }
        let start = visible.saturating_sub(lookback);
        Ok(bars[start..visible].to_vec())
    }
}
