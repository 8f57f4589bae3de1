//! Read-through cache in front of any `DataPort`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::domain::bar::{tail, PriceBar};
use crate::domain::error::SwingError;
use crate::ports::data_port::DataPort;

struct Entry {
    fetched_at: Instant,
    lookback: usize,
    bars: Vec<PriceBar>,
}

/// Serves `get_bars` from memory while an entry is younger than `ttl` and
/// covers the requested lookback. Errors pass through uncached.
pub struct CachedDataPort {
    inner: Arc<dyn DataPort>,
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry>>,
}

impl CachedDataPort {
    pub fn new(inner: Arc<dyn DataPort>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn invalidate(&self, symbol: &str) {
        self.entries.lock().remove(symbol);
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    fn cached(&self, symbol: &str, lookback: usize) -> Option<Vec<PriceBar>> {
        let entries = self.entries.lock();
        let entry = entries.get(symbol)?;
        if entry.fetched_at.elapsed() >= self.ttl || entry.lookback < lookback {
            return None;
        }
        Some(tail(entry.bars.clone(), lookback))
    }
}

impl DataPort for CachedDataPort {
    fn get_bars(&self, symbol: &str, lookback: usize) -> Result<Vec<PriceBar>, SwingError> {
        if let Some(bars) = self.cached(symbol, lookback) {
            debug!(symbol, "price cache hit");
            return Ok(bars);
        }

        // The lock is not held across the fetch; concurrent misses may both
        // reach the provider, last writer wins.
        let bars = self.inner.get_bars(symbol, lookback)?;
        self.entries.lock().insert(
            symbol.to_string(),
            Entry {
                fetched_at: Instant::now(),
                lookback,
                bars: bars.clone(),
            },
        );
        Ok(bars)
    }
}
