//! Immutable trading settings built once from the INI config.

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::config_validation::validate_trading_config;
use crate::domain::error::SwingError;
use crate::domain::execution::ExecutionConfig;
use crate::domain::universe::{self, Universe};
use crate::ports::config_port::ConfigPort;

#[derive(Debug, Clone, PartialEq)]
pub struct ScannerParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub oscillator_period: usize,
    pub oscillator_low: f64,
    pub oscillator_high: f64,
    pub swing_lookback: usize,
    pub pivot_bars: usize,
    pub target1_extension: f64,
    pub target2_extension: f64,
    pub lookback_bars: usize,
}

impl ScannerParams {
    /// Bars needed so both the latest and the prior bar carry valid values.
    pub fn min_bars(&self) -> usize {
        self.slow_period.max(self.oscillator_period + 1) + 1
    }
}

impl Default for ScannerParams {
    fn default() -> Self {
        ScannerParams {
            fast_period: 8,
            slow_period: 21,
            oscillator_period: 14,
            oscillator_low: 0.30,
            oscillator_high: 0.35,
            swing_lookback: 40,
            pivot_bars: 5,
            target1_extension: 1.272,
            target2_extension: 1.618,
            lookback_bars: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskParams {
    pub risk_pct: f64,
    pub max_positions: usize,
    pub max_drawdown_pct: f64,
    pub daily_loss_limit_pct: f64,
}

impl Default for RiskParams {
    fn default() -> Self {
        RiskParams {
            risk_pct: 0.02,
            max_positions: 10,
            max_drawdown_pct: 10.0,
            daily_loss_limit_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorParams {
    pub target1_fraction: f64,
    pub trailing_stop_enabled: bool,
    pub trailing_buffer_pct: f64,
}

impl Default for MonitorParams {
    fn default() -> Self {
        MonitorParams {
            target1_fraction: 0.25,
            trailing_stop_enabled: true,
            trailing_buffer_pct: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerParams {
    pub interval: Duration,
    pub fetch_timeout: Duration,
    pub max_workers: usize,
    pub auto_trade: bool,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        SchedulerParams {
            interval: Duration::from_secs(60 * 60),
            fetch_timeout: Duration::from_secs(30),
            max_workers: 4,
            auto_trade: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataParams {
    pub csv_dir: Option<PathBuf>,
    pub cache_ttl: Duration,
}

impl Default for DataParams {
    fn default() -> Self {
        DataParams {
            csv_dir: None,
            cache_ttl: Duration::from_secs(300),
        }
    }
}

/// Every tunable the engine reads. Shared as `Arc<TradingConfig>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingConfig {
    pub starting_cash: f64,
    pub execution: ExecutionConfig,
    pub risk: RiskParams,
    pub scanner: ScannerParams,
    pub monitor: MonitorParams,
    pub scheduler: SchedulerParams,
    pub universe: Universe,
    pub data: DataParams,
}

impl Default for TradingConfig {
    fn default() -> Self {
        TradingConfig {
            starting_cash: 150_000.0,
            execution: ExecutionConfig {
                commission_per_trade: 10.0,
                commission_pct: 0.0,
                slippage_pct: 0.1,
            },
            risk: RiskParams::default(),
            scanner: ScannerParams::default(),
            monitor: MonitorParams::default(),
            scheduler: SchedulerParams::default(),
            universe: Universe::default(),
            data: DataParams::default(),
        }
    }
}

impl TradingConfig {
    /// Validates and reads every section. Missing keys take their defaults.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, SwingError> {
        validate_trading_config(config)?;
        let d = TradingConfig::default();

        let execution = ExecutionConfig {
            commission_per_trade: config.get_double(
                "portfolio",
                "commission",
                d.execution.commission_per_trade,
            ),
            commission_pct: config.get_double(
                "portfolio",
                "commission_pct",
                d.execution.commission_pct,
            ),
            slippage_pct: config.get_double("portfolio", "slippage_pct", d.execution.slippage_pct),
        };

        let risk = RiskParams {
            risk_pct: config.get_double("risk", "risk_pct", d.risk.risk_pct),
            max_positions: get_usize(config, "risk", "max_positions", d.risk.max_positions),
            max_drawdown_pct: config.get_double("risk", "max_drawdown_pct", d.risk.max_drawdown_pct),
            daily_loss_limit_pct: config.get_double(
                "risk",
                "daily_loss_limit_pct",
                d.risk.daily_loss_limit_pct,
            ),
        };

        let s = &d.scanner;
        let scanner = ScannerParams {
            fast_period: get_usize(config, "scanner", "fast_period", s.fast_period),
            slow_period: get_usize(config, "scanner", "slow_period", s.slow_period),
            oscillator_period: get_usize(config, "scanner", "oscillator_period", s.oscillator_period),
            oscillator_low: config.get_double("scanner", "oscillator_low", s.oscillator_low),
            oscillator_high: config.get_double("scanner", "oscillator_high", s.oscillator_high),
            swing_lookback: get_usize(config, "scanner", "swing_lookback", s.swing_lookback),
            pivot_bars: get_usize(config, "scanner", "pivot_bars", s.pivot_bars),
            target1_extension: config.get_double("scanner", "target1_extension", s.target1_extension),
            target2_extension: config.get_double("scanner", "target2_extension", s.target2_extension),
            lookback_bars: get_usize(config, "scanner", "lookback_bars", s.lookback_bars),
        };

        let monitor = MonitorParams {
            target1_fraction: config.get_double(
                "monitor",
                "target1_fraction",
                d.monitor.target1_fraction,
            ),
            trailing_stop_enabled: config.get_bool(
                "monitor",
                "trailing_stop_enabled",
                d.monitor.trailing_stop_enabled,
            ),
            trailing_buffer_pct: config.get_double(
                "monitor",
                "trailing_buffer_pct",
                d.monitor.trailing_buffer_pct,
            ),
        };

        let scheduler = SchedulerParams {
            interval: Duration::from_secs(
                get_usize(config, "scheduler", "interval_minutes", 60) as u64 * 60,
            ),
            fetch_timeout: Duration::from_secs(
                get_usize(config, "scheduler", "fetch_timeout_secs", 30) as u64,
            ),
            max_workers: get_usize(config, "scheduler", "max_workers", d.scheduler.max_workers),
            auto_trade: config.get_bool("scheduler", "auto_trade", d.scheduler.auto_trade),
        };

        let data = DataParams {
            csv_dir: non_empty(config.get_string("data", "csv_dir")).map(PathBuf::from),
            cache_ttl: Duration::from_secs(get_usize(config, "data", "cache_ttl_secs", 300) as u64),
        };

        Ok(TradingConfig {
            starting_cash: config.get_double("portfolio", "starting_cash", d.starting_cash),
            execution,
            risk,
            scanner,
            monitor,
            scheduler,
            universe: read_universe(config)?,
            data,
        })
    }

    /// Fails when no symbols are configured. Commands that scan call this;
    /// inspection commands do not need a universe.
    pub fn require_universe(&self) -> Result<&Universe, SwingError> {
        if self.universe.is_empty() {
            return Err(SwingError::ConfigMissing {
                section: "universe".to_string(),
                key: "symbols".to_string(),
            });
        }
        Ok(&self.universe)
    }
}

fn get_usize(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> usize {
    config.get_int(section, key, default as i64).max(0) as usize
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn read_universe(config: &dyn ConfigPort) -> Result<Universe, SwingError> {
    let to_config_error = |key: &str, e: universe::UniverseError| SwingError::ConfigInvalid {
        section: "universe".to_string(),
        key: key.to_string(),
        reason: e.to_string(),
    };

    let symbols = match (
        non_empty(config.get_string("universe", "symbols")),
        non_empty(config.get_string("universe", "symbols_file")),
    ) {
        (Some(list), _) => universe::parse_symbols(&list).map_err(|e| to_config_error("symbols", e))?,
        (None, Some(path)) => universe::load_symbols_file(path)?,
        (None, None) => Vec::new(),
    };

    let regime_symbol = match non_empty(config.get_string("universe", "regime_symbol")) {
        Some(raw) => {
            Some(universe::normalize_symbol(&raw).map_err(|e| to_config_error("regime_symbol", e))?)
        }
        None => None,
    };

    Ok(Universe {
        symbols,
        regime_symbol,
    })
}
