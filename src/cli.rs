//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::allocation::{AllocationSnapshot, AllocationTable};
use crate::domain::backtest::{BacktestConfig, BacktestResult, Simulator};
use crate::domain::config_validation::{
    ticker_list_setting, ticker_setting, validate_config, weights_setting,
};
use crate::domain::error::SentinelError;
use crate::domain::frame::IndicatorFrame;
use crate::domain::metrics::{DEFAULT_PERIODS_PER_YEAR, Metrics};
use crate::domain::optimizer::{MinVarianceOptimizer, OptimizerConfig};
use crate::domain::regime::{Classification, ClassifierConfig, Regime, RegimeClassifier};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_RESULTS_PATH: &str = "data/processed/backtest_results.csv";
pub const DEFAULT_ALLOCATION_PATH: &str = "data/processed/target_allocation.csv";

#[derive(Parser, Debug)]
#[command(name = "macrosentinel", about = "Macro regime classifier and allocation backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Classify every row, run the backtest, and write results
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Indicator CSV; overrides [input] path
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Results CSV; overrides [output] results_path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the target allocation for the latest regime
    Allocate {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Allocation CSV; overrides [output] allocation_path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            input,
            output,
        } => run_backtest(&config, input.as_deref(), output.as_deref()),
        Command::Allocate {
            config,
            input,
            output,
        } => run_allocate(&config, input.as_deref(), output.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

/// Everything a run needs, resolved from the INI file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub classifier: ClassifierConfig,
    pub backtest: BacktestConfig,
    pub optimizer: OptimizerConfig,
    pub table: AllocationTable,
    pub periods_per_year: f64,
    pub risk_free_rate: f64,
    pub strategy_name: String,
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

/// Load, validate and build settings in one go.
fn load_settings(path: &Path) -> Result<(FileConfigAdapter, Settings), ExitCode> {
    eprintln!("Loading config from {}", path.display());
    let adapter = load_config(path)?;
    let settings = validate_config(&adapter)
        .and_then(|()| build_settings(&adapter))
        .map_err(|e| {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        })?;
    Ok((adapter, settings))
}

pub fn build_settings(adapter: &dyn ConfigPort) -> Result<Settings, SentinelError> {
    Ok(Settings {
        classifier: build_classifier_config(adapter)?,
        backtest: build_backtest_config(adapter)?,
        optimizer: build_optimizer_config(adapter)?,
        table: build_allocation_table(adapter)?,
        periods_per_year: adapter.get_double("report", "periods_per_year", DEFAULT_PERIODS_PER_YEAR),
        risk_free_rate: adapter.get_double("report", "risk_free_rate", 0.0),
        strategy_name: adapter
            .get_string("report", "strategy_name")
            .unwrap_or_else(|| "Macro Sentinel".to_string()),
    })
}

pub fn build_classifier_config(adapter: &dyn ConfigPort) -> Result<ClassifierConfig, SentinelError> {
    let d = ClassifierConfig::default();
    Ok(ClassifierConfig {
        labor_weight: adapter.get_double("classifier", "labor_weight", d.labor_weight),
        manufacturing_weight: adapter.get_double(
            "classifier",
            "manufacturing_weight",
            d.manufacturing_weight,
        ),
        liquidity_crunch: adapter.get_double("classifier", "liquidity_crunch", d.liquidity_crunch),
        recession_growth: adapter.get_double("classifier", "recession_growth", d.recession_growth),
        stagflation_inflation: adapter.get_double(
            "classifier",
            "stagflation_inflation",
            d.stagflation_inflation,
        ),
        growth_entry: adapter.get_double("classifier", "growth_entry", d.growth_entry),
        growth_exit: adapter.get_double("classifier", "growth_exit", d.growth_exit),
        rsi_overbought: adapter.get_double("classifier", "rsi_overbought", d.rsi_overbought),
        rsi_oversold: adapter.get_double("classifier", "rsi_oversold", d.rsi_oversold),
        rsi_period: adapter.get_int("classifier", "rsi_period", d.rsi_period as i64).max(1) as usize,
        rsi_reference: ticker_setting(adapter, "classifier", "rsi_reference", d.rsi_reference)?,
        hawkish_policy: adapter.get_double("classifier", "hawkish_policy", d.hawkish_policy),
        vix_fear: adapter.get_double("classifier", "vix_fear", d.vix_fear),
        hysteresis: adapter.get_bool("classifier", "hysteresis", d.hysteresis),
    })
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, SentinelError> {
    let d = BacktestConfig::default();
    let circuit_breaker_resume = adapter
        .get_string("simulation", "circuit_breaker_resume")
        .map(|_| adapter.get_double("simulation", "circuit_breaker_resume", d.max_drawdown_limit));
    Ok(BacktestConfig {
        max_drawdown_limit: adapter.get_double(
            "simulation",
            "max_drawdown_limit",
            d.max_drawdown_limit,
        ),
        circuit_breaker_resume,
        vix_threshold: adapter.get_double("simulation", "vix_threshold", d.vix_threshold),
        equity_keep: adapter.get_double("simulation", "equity_keep", d.equity_keep),
        friction_cost: adapter.get_double("simulation", "friction_cost", d.friction_cost),
        cash_asset: ticker_setting(adapter, "simulation", "cash_asset", d.cash_asset)?,
        benchmark: ticker_setting(adapter, "simulation", "benchmark", d.benchmark)?,
        use_optimizer: adapter.get_bool("simulation", "use_optimizer", d.use_optimizer),
        growth_assets: ticker_list_setting(
            adapter,
            "simulation",
            "growth_assets",
            &d.growth_assets,
        )?,
        burn_in: adapter.get_int("simulation", "burn_in", d.burn_in as i64).max(0) as usize,
        optimizer_window: adapter
            .get_int("simulation", "optimizer_window", d.optimizer_window as i64)
            .max(2) as usize,
    })
}

pub fn build_optimizer_config(adapter: &dyn ConfigPort) -> Result<OptimizerConfig, SentinelError> {
    let d = OptimizerConfig::default();
    Ok(OptimizerConfig {
        min_samples: adapter.get_int("optimizer", "min_samples", d.min_samples as i64).max(2)
            as usize,
        max_iterations: adapter
            .get_int("optimizer", "max_iterations", d.max_iterations as i64)
            .max(1) as usize,
        tolerance: adapter.get_double("optimizer", "tolerance", d.tolerance),
        fallback: weights_setting(adapter, "optimizer", "fallback")?.unwrap_or(d.fallback),
    })
}

/// Default table with any `[allocation]` overrides applied.
pub fn build_allocation_table(adapter: &dyn ConfigPort) -> Result<AllocationTable, SentinelError> {
    let mut table = AllocationTable::default();
    for regime in Regime::ALL {
        if let Some(weights) = weights_setting(adapter, "allocation", regime.short_name())? {
            table.set_weights(regime, weights);
        }
    }
    Ok(table)
}

fn resolve_path(
    override_path: Option<&Path>,
    adapter: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: Option<&str>,
) -> Result<PathBuf, SentinelError> {
    if let Some(p) = override_path {
        return Ok(p.to_path_buf());
    }
    adapter
        .get_string(section, key)
        .or_else(|| default.map(str::to_string))
        .map(PathBuf::from)
        .ok_or_else(|| SentinelError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

/// Output of a full classify-and-simulate pass.
#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub frame: IndicatorFrame,
    pub classifications: Vec<Classification>,
    pub result: BacktestResult,
    pub metrics: Metrics,
    pub snapshot: Option<AllocationSnapshot>,
}

/// Load, classify, simulate, and write results through the given ports.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    settings: &Settings,
    results_path: &str,
) -> Result<BacktestRun, SentinelError> {
    let frame = data_port.load_frame()?;
    eprintln!("  Processing: {} rows", frame.len());

    let classifier = RegimeClassifier::new(settings.classifier.clone());
    let classifications = classifier.classify_frame(&frame);
    let regimes: Vec<Regime> = classifications.iter().map(|c| c.regime).collect();

    let simulator = Simulator::new(
        settings.backtest.clone(),
        settings.table.clone(),
        MinVarianceOptimizer::new(settings.optimizer.clone()),
    );
    let result = simulator.run(&frame, &regimes);
    if result.steps.is_empty() {
        tracing::warn!(rows = frame.len(), "not enough rows to simulate");
    }

    let metrics = Metrics::compute(&result, settings.periods_per_year, settings.risk_free_rate);
    report_port.write_results(&frame, &classifications, &result, results_path)?;

    let snapshot = AllocationSnapshot::latest(&regimes, &settings.table);
    Ok(BacktestRun {
        frame,
        classifications,
        result,
        metrics,
        snapshot,
    })
}

fn run_backtest(config_path: &Path, input: Option<&Path>, output: Option<&Path>) -> ExitCode {
    let (adapter, settings) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let paths = resolve_path(input, &adapter, "input", "path", None).and_then(|input| {
        resolve_path(
            output,
            &adapter,
            "output",
            "results_path",
            Some(DEFAULT_RESULTS_PATH),
        )
        .map(|results| (input, results))
    });
    let (input_path, results_path) = match paths {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    eprintln!(
        "Running backtest: {} from {}",
        settings.strategy_name,
        input_path.display()
    );
    let data_port = CsvAdapter::new(input_path);
    let report_port = CsvReportAdapter::new();
    let results = results_path.display().to_string();
    let run = match run_backtest_pipeline(&data_port, &report_port, &settings, &results) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print_summary(&run);
    eprintln!("\nResults written to: {}", results);
    ExitCode::SUCCESS
}

fn print_summary(run: &BacktestRun) {
    let m = &run.metrics;
    eprintln!("\n=== Backtest Results ===");
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Benchmark Return: {:.2}%", m.benchmark_return * 100.0);
    eprintln!("Alpha:            {:+.2} pts", m.alpha);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Regime Changes:   {}", m.regime_changes);
    eprintln!("Breaker Steps:    {}", m.circuit_breaker_steps);
    eprintln!("Governor Steps:   {}", m.governor_steps);

    if !m.regime_share.is_empty() {
        eprintln!("\n=== Time in Regime ===");
        for (regime, share) in &m.regime_share {
            eprintln!("  {:<36} {:>5.1}%", regime.label(), share * 100.0);
        }
    }

    if let Some(snapshot) = &run.snapshot {
        print_snapshot(snapshot);
    }
}

fn print_snapshot(snapshot: &AllocationSnapshot) {
    eprintln!("\n=== Current Allocation ===");
    eprintln!("Regime:           {}", snapshot.regime);
    eprintln!("Strategy:         {}", snapshot.strategy);
    eprintln!("Primary Asset:    {}", snapshot.primary);
    for row in &snapshot.rows {
        eprintln!("  {}:  {:.1}%", row.ticker, row.weight * 100.0);
    }
}

/// Classify the frame and persist the allocation for its final regime.
pub fn run_allocate_pipeline(
    data_port: &dyn DataPort,
    report_port: &dyn ReportPort,
    settings: &Settings,
    allocation_path: &str,
) -> Result<Option<AllocationSnapshot>, SentinelError> {
    let frame = data_port.load_frame()?;
    let classifier = RegimeClassifier::new(settings.classifier.clone());
    let regimes: Vec<Regime> = classifier
        .classify_frame(&frame)
        .into_iter()
        .map(|c| c.regime)
        .collect();
    let snapshot = AllocationSnapshot::latest(&regimes, &settings.table);
    if let Some(snapshot) = &snapshot {
        report_port.write_allocation(snapshot, allocation_path)?;
    }
    Ok(snapshot)
}

fn run_allocate(config_path: &Path, input: Option<&Path>, output: Option<&Path>) -> ExitCode {
    let (adapter, settings) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let paths = resolve_path(input, &adapter, "input", "path", None).and_then(|input| {
        resolve_path(
            output,
            &adapter,
            "output",
            "allocation_path",
            Some(DEFAULT_ALLOCATION_PATH),
        )
        .map(|allocation| (input, allocation))
    });
    let (input_path, allocation_path) = match paths {
        Ok(p) => p,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let data_port = CsvAdapter::new(input_path);
    let report_port = CsvReportAdapter::new();
    let out = allocation_path.display().to_string();
    match run_allocate_pipeline(&data_port, &report_port, &settings, &out) {
        Ok(Some(snapshot)) => {
            print_snapshot(&snapshot);
            eprintln!("\nAllocation written to: {}", out);
            ExitCode::SUCCESS
        }
        Ok(None) => {
            let e = SentinelError::InputParse {
                line: 1,
                reason: "indicator file has no rows".to_string(),
            };
            eprintln!("error: {e}");
            (&e).into()
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_validate(config_path: &Path) -> ExitCode {
    let (_, settings) = match load_settings(config_path) {
        Ok(s) => s,
        Err(code) => return code,
    };

    let c = &settings.classifier;
    let b = &settings.backtest;
    eprintln!("\nClassifier:");
    eprintln!(
        "  growth entry/exit: {} / {} (hysteresis {})",
        c.growth_entry,
        c.growth_exit,
        if c.hysteresis { "on" } else { "off" }
    );
    eprintln!(
        "  RSI({}) on {}: oversold {} / overbought {}",
        c.rsi_period, c.rsi_reference, c.rsi_oversold, c.rsi_overbought
    );
    eprintln!("\nSimulation:");
    eprintln!("  max drawdown:  {:.1}%", b.max_drawdown_limit * 100.0);
    if let Some(resume) = b.circuit_breaker_resume {
        eprintln!("  resume below:  {:.1}%", resume * 100.0);
    }
    eprintln!("  VIX governor:  > {} keeps {:.0}% equity", b.vix_threshold, b.equity_keep * 100.0);
    eprintln!("  friction:      {}", b.friction_cost);
    if b.use_optimizer {
        let assets: Vec<&str> = b.growth_assets.iter().map(|t| t.symbol()).collect();
        eprintln!(
            "  optimizer:     {} (burn-in {}, window {})",
            assets.join(", "),
            b.burn_in,
            b.optimizer_window
        );
    }
    eprintln!("\nAllocations:");
    for regime in Regime::ALL {
        let playbook = settings.table.playbook(regime);
        eprintln!(
            "  {:<36} {:<22} {}",
            regime.label(),
            playbook.strategy,
            playbook.weights
        );
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
