//! CLI definition and dispatch.

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::{self, CsvDatasetAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_wallet_adapter::JsonWalletAdapter;
use crate::domain::action::{Action, ActionSet};
use crate::domain::config_validation::{
    validate_data_config, validate_environment_config, validate_reward_config,
    validate_wallet_config,
};
use crate::domain::environment::{EnvConfig, Environment, Termination, TradingEnvironment};
use crate::domain::episode::{
    run_episode, DecisionFn, HoldPolicy, RandomPolicy, ScriptedPolicy, ThresholdRule,
};
use crate::domain::error::GymError;
use crate::domain::frame::{MarketData, ObservationLayout};
use crate::domain::metrics::{EpisodeReport, DEFAULT_PERIODS_PER_YEAR};
use crate::domain::reward::{RewardConfig, RewardPolicyKind, Shaping};
use crate::domain::wallet::DEFAULT_MIN_RESERVE;
use crate::ports::capital_port::CapitalLedger;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "candlegym", about = "Trading environment simulator and evaluation backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one evaluation episode over a dataset
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Dataset CSV, overrides [data] path
        #[arg(short, long)]
        data: Option<PathBuf>,
        #[arg(long, value_enum, default_value_t = PolicyChoice::Hold)]
        policy: PolicyChoice,
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Comma-separated actions for the scripted policy, e.g. buy,hold,close
        #[arg(long)]
        script: Option<String>,
        /// Feature column read by the threshold policy
        #[arg(long)]
        column: Option<String>,
        #[arg(long, default_value_t = 1.0)]
        threshold: f32,
        #[arg(long)]
        equity_out: Option<PathBuf>,
        #[arg(long)]
        trades_out: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show dataset dimensions and the resulting observation shape
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Inspect or update the capital wallet
    Wallet {
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        action: WalletCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum WalletCommand {
    /// Print balances and today's PnL
    Show,
    /// Commit all free capital
    Reserve,
    /// Return capital after a trade
    Release { amount: f64 },
    /// Reconcile with the exchange balance
    Sync { balance: f64 },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyChoice {
    Hold,
    Random,
    Scripted,
    Threshold,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data,
            policy,
            seed,
            script,
            column,
            threshold,
            equity_out,
            trades_out,
        } => {
            let options = BacktestOptions {
                policy,
                seed,
                script,
                column,
                threshold,
                equity_out,
                trades_out,
            };
            run_backtest(&config, data.as_ref(), &options)
        }
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, data } => run_info(&config, data.as_ref()),
        Command::Wallet { config, action } => run_wallet(&config, &action),
    }
}

pub struct BacktestOptions {
    pub policy: PolicyChoice,
    pub seed: u64,
    pub script: Option<String>,
    pub column: Option<String>,
    pub threshold: f32,
    pub equity_out: Option<PathBuf>,
    pub trades_out: Option<PathBuf>,
}

fn fail(err: &GymError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn run_backtest(config_path: &Path, data_override: Option<&PathBuf>, options: &BacktestOptions) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        return fail(&e);
    }

    // Stage 2: Build environment config
    let env_config = match build_env_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    // Stage 3: Load dataset
    let data = match load_dataset(&adapter, data_override) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    // Stage 4: Build environment and decision function
    let mut env = match TradingEnvironment::new(Arc::clone(&data), env_config) {
        Ok(env) => env,
        Err(e) => return fail(&e),
    };
    let mut decision = match build_decision(options, &data, env.action_set()) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    // Stage 5: Run episode
    eprintln!(
        "Running {} policy over {} tradable steps (reward {})",
        policy_name(options.policy),
        env.tradable_steps(),
        env.reward_policy().version()
    );
    let run = match run_episode(&mut env, decision.as_mut()) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    // Stage 6: Report and exports
    let periods = adapter.get_double("report", "periods_per_year", DEFAULT_PERIODS_PER_YEAR);
    let report = EpisodeReport::compute(&run, periods);
    print_report(&report, &run.termination);

    if let Some(path) = &options.equity_out {
        if let Err(e) = csv_adapter::write_equity_curve(path, &run) {
            return fail(&e);
        }
        eprintln!("Equity curve written to {}", path.display());
    }
    if let Some(path) = &options.trades_out {
        if let Err(e) = csv_adapter::write_trades(path, &run.trades) {
            return fail(&e);
        }
        eprintln!("Trades written to {}", path.display());
    }

    ExitCode::SUCCESS
}

fn validate_all(config: &dyn ConfigPort) -> Result<(), GymError> {
    validate_environment_config(config)?;
    validate_reward_config(config)?;
    validate_data_config(config)?;
    Ok(())
}

pub fn build_env_config(adapter: &dyn ConfigPort) -> Result<EnvConfig, GymError> {
    let defaults = EnvConfig::default();

    let lookback = adapter.get_int(
        "environment",
        "lookback_window",
        defaults.lookback_window as i64,
    );
    let lookback_window = usize::try_from(lookback)
        .ok()
        .filter(|&v| v > 0)
        .ok_or_else(|| {
            GymError::invalid("environment", "lookback_window", "must be at least 1")
        })?;

    let action_set = ActionSet::try_from(adapter.get_int("environment", "action_set", 4))
        .map_err(|reason| GymError::invalid("environment", "action_set", reason))?;

    let observation = match adapter.get_string("environment", "observation") {
        Some(raw) => raw
            .parse::<ObservationLayout>()
            .map_err(|reason| GymError::invalid("environment", "observation", reason))?,
        None => defaults.observation,
    };

    let config = EnvConfig {
        lookback_window,
        initial_balance: adapter.get_double("environment", "initial_balance", defaults.initial_balance),
        fee_rate: adapter.get_double("environment", "fee_rate", defaults.fee_rate),
        bankruptcy_fraction: adapter.get_double(
            "environment",
            "bankruptcy_fraction",
            defaults.bankruptcy_fraction,
        ),
        position_fraction: adapter.get_double(
            "environment",
            "position_fraction",
            defaults.position_fraction,
        ),
        leverage: adapter.get_double("environment", "leverage", defaults.leverage),
        action_set,
        observation,
        reward: build_reward_config(adapter)?,
    };
    config.validate()?;
    Ok(config)
}

pub fn build_reward_config(adapter: &dyn ConfigPort) -> Result<RewardConfig, GymError> {
    let defaults = RewardConfig::default();
    let kind = match adapter.get_string("reward", "policy") {
        Some(raw) => raw
            .parse::<RewardPolicyKind>()
            .map_err(|reason| GymError::invalid("reward", "policy", reason))?,
        None => defaults.kind,
    };
    let shaping = Shaping {
        close_penalty: adapter.get_double("reward", "close_penalty", defaults.shaping.close_penalty),
        loss_aversion: adapter.get_double("reward", "loss_aversion", defaults.shaping.loss_aversion),
        drawdown_threshold: adapter.get_double(
            "reward",
            "drawdown_threshold",
            defaults.shaping.drawdown_threshold,
        ),
        drawdown_penalty: adapter.get_double(
            "reward",
            "drawdown_penalty",
            defaults.shaping.drawdown_penalty,
        ),
        bankruptcy_penalty: adapter.get_double(
            "reward",
            "bankruptcy_penalty",
            defaults.shaping.bankruptcy_penalty,
        ),
    };
    Ok(RewardConfig {
        kind,
        scale: adapter.get_double("reward", "scale", defaults.scale),
        mark_to_market_scale: adapter.get_double(
            "reward",
            "mark_to_market_scale",
            defaults.mark_to_market_scale,
        ),
        shaping,
    })
}

pub fn build_dataset_adapter(
    adapter: &dyn ConfigPort,
    data_override: Option<&PathBuf>,
) -> Result<CsvDatasetAdapter, GymError> {
    let path = match data_override {
        Some(p) => p.clone(),
        None => adapter
            .get_string("data", "path")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| GymError::ConfigMissing {
                section: "data".into(),
                key: "path".into(),
            })?,
    };
    let price_column = adapter
        .get_string("data", "price_column")
        .unwrap_or_else(|| "close".to_string());

    Ok(CsvDatasetAdapter::new(path)
        .with_price_column(price_column)
        .with_exclude(adapter.get_list("data", "exclude"))
        .with_normalize(adapter.get_bool("data", "normalize", true))
        .with_clip(adapter.get_double("data", "clip", 5.0)))
}

fn load_dataset(adapter: &dyn ConfigPort, data_override: Option<&PathBuf>) -> Result<Arc<MarketData>, GymError> {
    let dataset = build_dataset_adapter(adapter, data_override)?;
    eprintln!("Loading dataset from {}", dataset.describe());
    Ok(Arc::new(dataset.load_market_data()?))
}

fn build_decision(
    options: &BacktestOptions,
    data: &MarketData,
    action_set: ActionSet,
) -> Result<Box<dyn DecisionFn>, GymError> {
    match options.policy {
        PolicyChoice::Hold => Ok(Box::new(HoldPolicy)),
        PolicyChoice::Random => Ok(Box::new(RandomPolicy::new(options.seed, action_set))),
        PolicyChoice::Scripted => {
            let script = options.script.as_deref().unwrap_or_default();
            let actions = script
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Action>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|reason| GymError::invalid("cli", "script", reason))?;
            Ok(Box::new(ScriptedPolicy::new(actions)))
        }
        PolicyChoice::Threshold => {
            let name = options.column.as_deref().ok_or_else(|| GymError::ConfigMissing {
                section: "cli".into(),
                key: "column".into(),
            })?;
            let column = data.frame().column_index(name).ok_or_else(|| {
                GymError::invalid("cli", "column", format!("no feature column named '{name}'"))
            })?;
            Ok(Box::new(ThresholdRule {
                column,
                threshold: options.threshold,
                action_set,
            }))
        }
    }
}

fn policy_name(policy: PolicyChoice) -> &'static str {
    match policy {
        PolicyChoice::Hold => "hold",
        PolicyChoice::Random => "random",
        PolicyChoice::Scripted => "scripted",
        PolicyChoice::Threshold => "threshold",
    }
}

fn print_report(report: &EpisodeReport, termination: &Termination) {
    println!("Episode ({:?}, {} steps)", termination, report.steps);
    println!("  Initial balance:     {:.2}", report.initial_balance);
    println!("  Final net worth:     {:.2}", report.final_net_worth);
    println!("  Total return:        {:.2}%", report.total_return_pct);
    println!("  Max drawdown:        {:.2}%", report.max_drawdown_pct);
    println!("  Direction changes:   {}", report.direction_changes);
    println!("  Total reward:        {:.4}", report.total_reward);
    println!("  Sharpe ratio:        {:.3}", report.sharpe_ratio);
    println!("  Sortino ratio:       {:.3}", report.sortino_ratio);
    println!(
        "  Trades:              {} ({} won, {} lost, {} even)",
        report.trades, report.trades_won, report.trades_lost, report.trades_breakeven
    );
    println!("  Win rate:            {:.1}%", report.win_rate * 100.0);
    println!("  Profit factor:       {:.2}", report.profit_factor);
    println!("  Avg bars held:       {:.1}", report.avg_bars_held);
    println!("  Fees paid:           {:.2}", report.total_fees);
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        return fail(&e);
    }
    let env_config = match build_env_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };

    eprintln!("\nEnvironment:");
    eprintln!("  lookback_window:     {}", env_config.lookback_window);
    eprintln!("  initial_balance:     {}", env_config.initial_balance);
    eprintln!("  fee_rate:            {}", env_config.fee_rate);
    eprintln!("  bankruptcy_fraction: {}", env_config.bankruptcy_fraction);
    eprintln!("  position_fraction:   {}", env_config.position_fraction);
    eprintln!("  leverage:            {}", env_config.leverage);
    eprintln!("  actions:             {}", env_config.action_set.len());
    eprintln!("  minimum rows:        {}", env_config.min_rows());
    eprintln!("\nReward:");
    eprintln!("  policy:              {}", env_config.reward.kind);
    eprintln!("  scale:               {}", env_config.reward.scale);
    eprintln!("  bankruptcy_penalty:  {}", env_config.reward.shaping.bankruptcy_penalty);

    if adapter.get_string("wallet", "path").is_some()
        && let Err(e) = validate_wallet_config(&adapter)
    {
        return fail(&e);
    }

    eprintln!("\nConfig is valid.");
    ExitCode::SUCCESS
}

fn run_info(config_path: &Path, data_override: Option<&PathBuf>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_all(&adapter) {
        return fail(&e);
    }
    let env_config = match build_env_config(&adapter) {
        Ok(c) => c,
        Err(e) => return fail(&e),
    };
    let data = match load_dataset(&adapter, data_override) {
        Ok(d) => d,
        Err(e) => return fail(&e),
    };

    println!("Rows:              {}", data.len());
    println!("Features:          {}", data.frame().columns().join(", "));
    let env = match TradingEnvironment::new(data, env_config) {
        Ok(env) => env,
        Err(e) => return fail(&e),
    };
    println!("Observation shape: {}", env.observation_shape());
    println!("Actions:           {}", env.action_set().len());
    println!("Tradable steps:    {}", env.tradable_steps());
    ExitCode::SUCCESS
}

fn run_wallet(config_path: &Path, action: &WalletCommand) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_wallet_config(&adapter) {
        return fail(&e);
    }

    let path = adapter.get_string("wallet", "path").unwrap_or_default();
    let opening = adapter.get_double("wallet", "opening_balance", 0.0);
    let min_reserve = adapter.get_double("wallet", "min_reserve", DEFAULT_MIN_RESERVE);
    let today = Local::now().date_naive();

    let mut ledger = match JsonWalletAdapter::open(path, opening, min_reserve, today) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };

    let result = match action {
        WalletCommand::Show => Ok(()),
        WalletCommand::Reserve => ledger.reserve().map(|amount| {
            println!("Reserved: {amount:.2}");
        }),
        WalletCommand::Release { amount } => ledger.release(*amount).map(|returned| {
            println!("Released: {returned:.2}");
        }),
        WalletCommand::Sync { balance } => ledger.sync_balance(*balance, today),
    };
    if let Err(e) = result {
        return fail(&e);
    }

    let (pnl, pct) = ledger.daily_pnl();
    println!("Available: {:.2}", ledger.available());
    println!("In use:    {:.2}", ledger.in_use());
    println!("Day PnL:   {:.2} ({:.2}%)", pnl, pct);
    ExitCode::SUCCESS
}
