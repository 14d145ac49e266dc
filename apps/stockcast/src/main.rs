mod commands;
mod infra;
mod obs;

use clap::{Parser, Subcommand, ValueEnum};
use commands::Command;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "stockcast")]
#[command(about = "Walk-forward stock signal backtesting", version, arg_required_else_help = true)]
#[command(
    after_help = "Examples:\n  stockcast backtest --config configs/sample.toml\n  stockcast optimize --config configs/sample.toml --top 5\n  stockcast fetch --config configs/sample.toml --refresh\n  stockcast cache stats --config configs/sample.toml\n  stockcast report --input runs/<run_id>/\n"
)]
struct Cli {
    /// Log filter (overridden by STOCKCAST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Serve Prometheus metrics on host:port.
    #[arg(long, global = true)]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum CliCommand {
    /// Walk forward over [run.start, run.end] and simulate the signals.
    Backtest {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Search trading parameters on a train window, check on a test window.
    Optimize {
        #[arg(long)]
        config: PathBuf,
        #[arg(long)]
        out: Option<PathBuf>,
        /// Leaderboard rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Load price data for the configured run and warm the cache.
    Fetch {
        #[arg(long)]
        config: PathBuf,
        /// Ignore cached rows and fetch from the provider.
        #[arg(long, default_value_t = false)]
        refresh: bool,
    },
    /// Inspect or clear the price cache.
    Cache {
        #[arg(long)]
        config: PathBuf,
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Check a config file without running anything.
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the summary of a finished run directory.
    Report {
        #[arg(long)]
        input: PathBuf,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    Stats,
    Clear {
        /// Only remove rows for this symbol.
        #[arg(long)]
        symbol: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let log_format = match cli.log_format {
        LogFormat::Text => "text",
        LogFormat::Json => "json",
    };
    if let Err(err) = obs::init_tracing(&cli.log_level, log_format) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
    if let Err(err) = obs::init_metrics(cli.metrics_addr.as_deref()) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }

    let command = match cli.command {
        CliCommand::Backtest { config, out } => Command::Backtest { config, out },
        CliCommand::Optimize { config, out, top } => Command::Optimize { config, out, top },
        CliCommand::Fetch { config, refresh } => Command::Fetch { config, refresh },
        CliCommand::Cache { config, action } => match action {
            CacheAction::Stats => Command::CacheStats { config },
            CacheAction::Clear { symbol } => Command::CacheClear { config, symbol },
        },
        CliCommand::Validate { config } => Command::Validate { config },
        CliCommand::Report { input } => Command::Report { input },
    };

    if let Err(err) = commands::run(command) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
