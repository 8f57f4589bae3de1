//! Trading universe: the symbol list scanned each cycle.
//!
//! Symbols come from a comma list in the config or from a symbols file with
//! one ticker per line. Tickers are upper-cased and checked for characters a
//! market data provider accepts (e.g. `BHP.AX`, `^AXJO`); anything else is
//! skipped with a warning.

use crate::domain::error::SwingError;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Universe {
    pub symbols: Vec<String>,
    pub regime_symbol: Option<String>,
}

impl Universe {
    pub fn count(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Universe symbols plus any extra (held) symbols, without duplicates,
    /// in first-seen order.
    pub fn fetch_list(&self, held: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        self.symbols
            .iter()
            .chain(held.iter())
            .filter(|s| seen.insert(s.as_str()))
            .cloned()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UniverseError {
    #[error("empty token in symbol list")]
    EmptyToken,

    #[error("duplicate symbol: {0}")]
    DuplicateSymbol(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),
}

pub fn normalize_symbol(raw: &str) -> Result<String, UniverseError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(UniverseError::EmptyToken);
    }
    let valid = symbol.len() <= 16
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '-' | '='));
    if !valid {
        return Err(UniverseError::InvalidSymbol(raw.trim().to_string()));
    }
    Ok(symbol)
}

pub fn parse_symbols(input: &str) -> Result<Vec<String>, UniverseError> {
    collect_unique(input.split(','))
}

/// Parses a symbols file body: one ticker per line, blank lines and `#`
/// comments ignored.
pub fn parse_symbols_file(content: &str) -> Result<Vec<String>, UniverseError> {
    collect_unique(
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#')),
    )
}

pub fn load_symbols_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, SwingError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_symbols_file(&content).map_err(|e| SwingError::ConfigInvalid {
        section: "universe".to_string(),
        key: "symbols_file".to_string(),
        reason: format!("{}: {}", path.display(), e),
    })
}

fn collect_unique<'a>(tokens: impl Iterator<Item = &'a str>) -> Result<Vec<String>, UniverseError> {
    let mut symbols = Vec::new();
    let mut seen = HashSet::new();

    for token in tokens {
        let symbol = match normalize_symbol(token) {
            Ok(symbol) => symbol,
            Err(UniverseError::InvalidSymbol(raw)) => {
                warn!(symbol = %raw, "skipping invalid ticker");
                continue;
            }
            Err(e) => return Err(e),
        };
        if !seen.insert(symbol.clone()) {
            return Err(UniverseError::DuplicateSymbol(symbol));
        }
        symbols.push(symbol);
    }

    Ok(symbols)
}
