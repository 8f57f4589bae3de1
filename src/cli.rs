//! CLI definition and dispatch.

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapters::cached_data::CachedDataPort;
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::sqlite_adapter::SqliteAdapter;
use crate::backtest::{run_backtest, BacktestOptions};
use crate::domain::bar::PriceBar;
use crate::domain::error::SwingError;
use crate::domain::ledger::Ledger;
use crate::domain::metrics::Metrics;
use crate::domain::position::ExitReason;
use crate::domain::scanner::Signal;
use crate::domain::settings::TradingConfig;
use crate::logging::init_tracing;
use crate::orchestrator::{CycleReport, Orchestrator};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::ledger_store::LedgerStore;
use crate::scheduler::{stop_channel, Scheduler};

#[derive(Parser, Debug)]
#[command(name = "swingtrader", about = "ASX swing-trading simulator")]
pub struct Cli {
    /// INI configuration file
    #[arg(short, long, global = true, default_value = "swingtrader.ini")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run cycles on the configured interval until Ctrl-C
    Run,
    /// Run a single cycle now
    Cycle,
    /// Scan the universe and print ranked signals without trading
    Scan,
    /// Portfolio summary
    Status,
    /// List positions
    Positions {
        /// Include closed positions
        #[arg(long)]
        all: bool,
    },
    /// Trade journal
    Trades {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Equity curve
    Equity {
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Performance statistics
    Stats {
        #[arg(long, default_value_t = 0.0)]
        risk_free_rate: f64,
    },
    /// Recent notifications
    Notifications {
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },
    /// Close a position manually
    Close {
        id: u64,
        #[arg(long)]
        price: f64,
    },
    /// Print the effective settings
    Settings,
    /// Wipe positions and history and restart from starting cash
    Reset {
        #[arg(long)]
        yes: bool,
    },
    /// Replay history day by day
    Backtest {
        #[arg(long)]
        start: Option<NaiveDate>,
        #[arg(long)]
        end: Option<NaiveDate>,
        #[arg(long, default_value_t = 0.0)]
        risk_free_rate: f64,
    },
    /// Load <SYMBOL>.csv files into the price table
    Import { dir: PathBuf },
}

struct Context {
    config: Arc<TradingConfig>,
    store: Arc<SqliteAdapter>,
}

impl Context {
    fn ledger(&self) -> Result<Ledger, SwingError> {
        Ledger::load(
            self.store.clone(),
            self.config.starting_cash,
            self.config.execution.clone(),
        )
    }

    fn data_port(&self) -> Arc<dyn DataPort> {
        let source: Arc<dyn DataPort> = match &self.config.data.csv_dir {
            Some(dir) => Arc::new(CsvAdapter::new(dir.clone())),
            None => self.store.clone(),
        };
        Arc::new(CachedDataPort::new(source, self.config.data.cache_ttl))
    }

    fn orchestrator(&self) -> Result<Orchestrator, SwingError> {
        Ok(Orchestrator::new(
            self.config.clone(),
            self.data_port(),
            Arc::new(Mutex::new(self.ledger()?)),
            self.store.clone(),
        ))
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let adapter = match load_config(&cli.config) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let level = adapter
        .get_string("log", "level")
        .unwrap_or_else(|| "info".to_string());
    let format = adapter
        .get_string("log", "format")
        .unwrap_or_else(|| "text".to_string());
    if let Err(e) = init_tracing(&level, &format) {
        eprintln!("error: {e}");
        return ExitCode::from(2);
    }

    match execute(&adapter, cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

/// Runs one command against a loaded configuration.
pub fn execute(adapter: &dyn ConfigPort, command: Command) -> Result<(), SwingError> {
    let ctx = open_context(adapter)?;

    match command {
        Command::Run => run_loop(&ctx),
        Command::Cycle => run_once(&ctx),
        Command::Scan => run_scan(&ctx),
        Command::Status => run_status(&ctx),
        Command::Positions { all } => run_positions(&ctx, all),
        Command::Trades { limit } => run_trades(&ctx, limit),
        Command::Equity { limit } => run_equity(&ctx, limit),
        Command::Stats { risk_free_rate } => run_stats(&ctx, risk_free_rate),
        Command::Notifications { limit } => run_notifications(&ctx, limit),
        Command::Close { id, price } => run_close(&ctx, id, price),
        Command::Settings => {
            print_settings(&ctx.config);
            Ok(())
        }
        Command::Reset { yes } => run_reset(&ctx, yes),
        Command::Backtest {
            start,
            end,
            risk_free_rate,
        } => run_backtest_command(
            &ctx,
            BacktestOptions {
                start,
                end,
                risk_free_rate,
            },
        ),
        Command::Import { dir } => run_import(&ctx, &dir),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn open_context(adapter: &dyn ConfigPort) -> Result<Context, SwingError> {
    let config = TradingConfig::from_config(adapter)?;
    let store = SqliteAdapter::from_config(adapter)?;
    Ok(Context {
        config: Arc::new(config),
        store: Arc::new(store),
    })
}

fn fail(e: &SwingError) -> ExitCode {
    eprintln!("error: {e}");
    ExitCode::from(e)
}

fn runtime() -> Result<tokio::runtime::Runtime, SwingError> {
    Ok(tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?)
}

fn run_loop(ctx: &Context) -> Result<(), SwingError> {
    ctx.config.require_universe()?;
    let orchestrator = Arc::new(ctx.orchestrator()?);
    let scheduler = Scheduler::new(orchestrator, ctx.config.scheduler.interval);
    let (handle, rx) = stop_channel();

    runtime()?.block_on(async move {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("stop requested, finishing current cycle");
                handle.stop();
            }
        });
        scheduler.run(rx).await
    });
    Ok(())
}

fn run_once(ctx: &Context) -> Result<(), SwingError> {
    let orchestrator = ctx.orchestrator()?;
    let now = Local::now().naive_local();
    let report = runtime()?.block_on(orchestrator.run_cycle(now))?;
    print_cycle(&report);
    Ok(())
}

fn print_cycle(report: &CycleReport) {
    println!("Cycle {}", report.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!(
        "  Symbols:  {} fetched, {} skipped",
        report.symbols_fetched,
        report.symbols_skipped.len()
    );
    if let Some(regime) = report.regime {
        println!("  Regime:   {}", regime);
    }
    if let Some(gate) = &report.entry_gate {
        println!("  Entries paused: {}", gate);
    }
    println!("  Signals:  {}", report.signals.len());
    for p in &report.opened {
        println!(
            "  OPEN   #{} {} {} @ {:.3} stop {:.3} t1 {:.3} t2 {:.3}",
            p.id, p.symbol, p.total_shares, p.entry_price, p.stop_price, p.target1_price, p.target2_price
        );
    }
    for t in &report.trades {
        println!(
            "  {:<6} #{} {} {} @ {:.3} pnl {:+.2}",
            t.exit_reason.as_str(),
            t.position_id,
            t.symbol,
            t.shares_closed,
            t.exit_price,
            t.realized_pnl
        );
    }
    println!("  Equity:   ${:.2}", report.equity);
}

fn run_scan(ctx: &Context) -> Result<(), SwingError> {
    let orchestrator = ctx.orchestrator()?;
    let signals = runtime()?.block_on(orchestrator.scan_only())?;
    print_signals(&signals);
    Ok(())
}

fn print_signals(signals: &[Signal]) {
    if signals.is_empty() {
        println!("No signals");
        return;
    }
    println!(
        "{:<10} {:>10} {:>9} {:>9} {:>9} {:>9} {:>6} {:>5}",
        "Symbol", "Date", "Trigger", "Stop", "Target1", "Target2", "DeM", "R:R"
    );
    for s in signals {
        println!(
            "{:<10} {:>10} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {:>6.3} {:>5.2}",
            s.symbol,
            s.date,
            s.trigger_price,
            s.stop_price,
            s.target1_price,
            s.target2_price,
            s.oscillator,
            s.reward_risk()
        );
    }
}

fn run_status(ctx: &Context) -> Result<(), SwingError> {
    let ledger = ctx.ledger()?;
    let state = ledger.state();
    let last = ctx.store.snapshots()?.pop();
    let equity = last.as_ref().map(|s| s.equity).unwrap_or(state.equity);
    let ret = if state.starting_cash > 0.0 {
        (equity - state.starting_cash) / state.starting_cash * 100.0
    } else {
        0.0
    };

    println!("Starting cash:  ${:.2}", state.starting_cash);
    println!("Cash:           ${:.2}", state.cash);
    println!("Equity:         ${:.2} ({:+.2}%)", equity, ret);
    println!("Realized P&L:   ${:+.2}", state.realized_pnl_total);
    println!(
        "Open positions: {} / {}",
        state.position_count(),
        ctx.config.risk.max_positions
    );
    if let Some(s) = last {
        println!("Last snapshot:  {}", s.timestamp.format("%Y-%m-%d %H:%M"));
    }
    Ok(())
}

fn run_positions(ctx: &Context, all: bool) -> Result<(), SwingError> {
    let positions: Vec<_> = ctx
        .store
        .positions()?
        .into_iter()
        .filter(|p| all || p.is_active())
        .collect();
    if positions.is_empty() {
        println!("No positions");
        return Ok(());
    }
    println!(
        "{:>4} {:<10} {:<16} {:>7} {:>7} {:>9} {:>9} {:>9} {:>9} {}",
        "ID", "Symbol", "Status", "Shares", "Left", "Entry", "Stop", "Target1", "Target2", "Opened"
    );
    for p in positions {
        println!(
            "{:>4} {:<10} {:<16} {:>7} {:>7} {:>9.3} {:>9.3} {:>9.3} {:>9.3} {}",
            p.id,
            p.symbol,
            p.status.as_str(),
            p.total_shares,
            p.remaining_shares,
            p.entry_price,
            p.stop_price,
            p.target1_price,
            p.target2_price,
            p.open_timestamp.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn last_n<T>(mut items: Vec<T>, limit: Option<usize>) -> Vec<T> {
    if let Some(n) = limit {
        let skip = items.len().saturating_sub(n);
        items.drain(..skip);
    }
    items
}

fn run_trades(ctx: &Context, limit: Option<usize>) -> Result<(), SwingError> {
    let trades = last_n(ctx.store.trades()?, limit);
    if trades.is_empty() {
        println!("No trades");
        return Ok(());
    }
    println!(
        "{:>4} {:<10} {:<8} {:>7} {:>9} {:>9} {:>10} {:>5} {}",
        "Pos", "Symbol", "Reason", "Shares", "Entry", "Exit", "P&L", "Days", "Closed"
    );
    for t in trades {
        println!(
            "{:>4} {:<10} {:<8} {:>7} {:>9.3} {:>9.3} {:>+10.2} {:>5} {}",
            t.position_id,
            t.symbol,
            t.exit_reason.as_str(),
            t.shares_closed,
            t.entry_price,
            t.exit_price,
            t.realized_pnl,
            t.holding_days(),
            t.close_timestamp.format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn run_equity(ctx: &Context, limit: Option<usize>) -> Result<(), SwingError> {
    let snapshots = last_n(ctx.store.snapshots()?, limit);
    if snapshots.is_empty() {
        println!("No snapshots");
        return Ok(());
    }
    println!("{:<19} {:>14} {:>14} {:>14}", "Timestamp", "Equity", "Cash", "Positions");
    for s in snapshots {
        println!(
            "{:<19} {:>14.2} {:>14.2} {:>14.2}",
            s.timestamp.format("%Y-%m-%d %H:%M:%S"),
            s.equity,
            s.cash,
            s.positions_value
        );
    }
    Ok(())
}

fn run_stats(ctx: &Context, risk_free_rate: f64) -> Result<(), SwingError> {
    let ledger = ctx.ledger()?;
    let metrics = Metrics::compute(
        ledger.state().starting_cash,
        &ctx.store.positions()?,
        &ctx.store.trades()?,
        &ctx.store.snapshots()?,
        risk_free_rate,
    );
    print_metrics(&metrics);
    Ok(())
}

fn print_metrics(m: &Metrics) {
    println!("Total Return:     {:.2}%", m.total_return * 100.0);
    println!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    println!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    println!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    println!("Max Drawdown:     -{:.1}% ({} periods)", m.max_drawdown * 100.0, m.max_drawdown_duration);
    println!(
        "Positions:        {} won, {} lost, {} flat",
        m.positions_won, m.positions_lost, m.positions_breakeven
    );
    println!("Exit Lots:        {}", m.exit_lots);
    println!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    println!("Profit Factor:    {:.2}", m.profit_factor);
    println!("Net P&L:          ${:+.2}", m.net_pnl);
    println!("Avg Win / Loss:   ${:.2} ({:+.2}%) / ${:.2} ({:+.2}%)", m.avg_win, m.avg_win_pct, m.avg_loss, m.avg_loss_pct);
    println!("Avg Holding:      {:.1} days", m.avg_holding_days);
    if let Some(best) = &m.best {
        println!("Best:             {} #{} ${:+.2}", best.symbol, best.position_id, best.pnl);
    }
    if let Some(worst) = &m.worst {
        println!("Worst:            {} #{} ${:+.2}", worst.symbol, worst.position_id, worst.pnl);
    }
}

fn run_notifications(ctx: &Context, limit: usize) -> Result<(), SwingError> {
    let notes = ctx.store.notifications(limit)?;
    if notes.is_empty() {
        println!("No notifications");
    }
    for n in notes {
        println!(
            "{} [{:<7}] {}",
            n.timestamp.format("%Y-%m-%d %H:%M:%S"),
            n.level.as_str(),
            n.message
        );
    }
    Ok(())
}

fn run_close(ctx: &Context, id: u64, price: f64) -> Result<(), SwingError> {
    if !(price > 0.0) {
        return Err(SwingError::InvalidQuantity {
            reason: format!("exit price {price} must be positive"),
        });
    }
    let mut ledger = ctx.ledger()?;
    let shares = ledger
        .state()
        .get_position(id)
        .map(|p| p.remaining_shares)
        .ok_or(SwingError::UnknownPosition { id })?;
    let trade = ledger.close_partial(id, shares, price, ExitReason::Manual, Local::now().naive_local())?;
    println!(
        "Closed #{} {} {} @ {:.3} pnl {:+.2}",
        trade.position_id, trade.symbol, trade.shares_closed, trade.exit_price, trade.realized_pnl
    );
    Ok(())
}

fn print_settings(config: &TradingConfig) {
    let e = &config.execution;
    let r = &config.risk;
    let s = &config.scanner;
    let m = &config.monitor;
    let sch = &config.scheduler;

    println!("[portfolio]");
    println!("starting_cash = {}", config.starting_cash);
    println!("commission = {}", e.commission_per_trade);
    println!("commission_pct = {}", e.commission_pct);
    println!("slippage_pct = {}", e.slippage_pct);
    println!("\n[risk]");
    println!("risk_pct = {}", r.risk_pct);
    println!("max_positions = {}", r.max_positions);
    println!("max_drawdown_pct = {}", r.max_drawdown_pct);
    println!("daily_loss_limit_pct = {}", r.daily_loss_limit_pct);
    println!("\n[scanner]");
    println!("fast_period = {}", s.fast_period);
    println!("slow_period = {}", s.slow_period);
    println!("oscillator_period = {}", s.oscillator_period);
    println!("oscillator_low = {}", s.oscillator_low);
    println!("oscillator_high = {}", s.oscillator_high);
    println!("swing_lookback = {}", s.swing_lookback);
    println!("pivot_bars = {}", s.pivot_bars);
    println!("target1_extension = {}", s.target1_extension);
    println!("target2_extension = {}", s.target2_extension);
    println!("lookback_bars = {}", s.lookback_bars);
    println!("\n[monitor]");
    println!("target1_fraction = {}", m.target1_fraction);
    println!("trailing_stop_enabled = {}", m.trailing_stop_enabled);
    println!("trailing_buffer_pct = {}", m.trailing_buffer_pct);
    println!("\n[scheduler]");
    println!("interval_minutes = {}", sch.interval.as_secs() / 60);
    println!("fetch_timeout_secs = {}", sch.fetch_timeout.as_secs());
    println!("max_workers = {}", sch.max_workers);
    println!("auto_trade = {}", sch.auto_trade);
    println!("\n[universe]");
    println!("symbols = {}", config.universe.symbols.join(","));
    if let Some(regime) = &config.universe.regime_symbol {
        println!("regime_symbol = {}", regime);
    }
    println!("\n[data]");
    match &config.data.csv_dir {
        Some(dir) => println!("csv_dir = {}", dir.display()),
        None => println!("csv_dir = (sqlite ohlcv)"),
    }
    println!("cache_ttl_secs = {}", config.data.cache_ttl.as_secs());
}

fn run_reset(ctx: &Context, yes: bool) -> Result<(), SwingError> {
    if !yes {
        eprintln!("Refusing to reset without --yes: this deletes all positions, trades and history");
        return Err(SwingError::InvalidQuantity {
            reason: "reset not confirmed".to_string(),
        });
    }
    let mut ledger = ctx.ledger()?;
    ledger.reset(ctx.config.starting_cash, Local::now().naive_local())?;
    println!("Portfolio reset to ${:.2}", ctx.config.starting_cash);
    Ok(())
}

fn load_histories(ctx: &Context) -> Result<HashMap<String, Vec<PriceBar>>, SwingError> {
    let universe = ctx.config.require_universe()?;
    let source: Arc<dyn DataPort> = match &ctx.config.data.csv_dir {
        Some(dir) => Arc::new(CsvAdapter::new(dir.clone())),
        None => ctx.store.clone(),
    };

    let mut histories = HashMap::new();
    let symbols = universe.symbols.iter().chain(universe.regime_symbol.iter());
    for symbol in symbols {
        match source.get_bars(symbol, usize::MAX) {
            Ok(bars) => {
                histories.insert(symbol.clone(), bars);
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "no history, skipping"),
        }
    }
    Ok(histories)
}

fn run_backtest_command(ctx: &Context, options: BacktestOptions) -> Result<(), SwingError> {
    let histories = load_histories(ctx)?;
    eprintln!("Loaded history for {} symbols", histories.len());

    let report = runtime()?.block_on(run_backtest(ctx.config.clone(), histories, &options))?;

    println!("=== Backtest {} to {} ({} cycles) ===", report.start, report.end, report.cycles);
    println!("Final Equity:     ${:.2}", report.final_equity);
    print_metrics(&report.metrics);
    Ok(())
}

fn run_import(ctx: &Context, dir: &Path) -> Result<(), SwingError> {
    let csv = CsvAdapter::new(dir.to_path_buf());
    let mut imported = 0;
    for symbol in csv.list_symbols()? {
        match csv.load_history(&symbol) {
            Ok(bars) => {
                let n = ctx.store.insert_bars(&bars)?;
                eprintln!("  {}: {} bars", symbol, n);
                imported += 1;
            }
            Err(e) => warn!(symbol = %symbol, error = %e, "import skipped"),
        }
    }
    println!("Imported {} symbols from {}", imported, dir.display());
    Ok(())
}
