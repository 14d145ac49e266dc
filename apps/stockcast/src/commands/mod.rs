mod backtest;
mod cache;
mod common;
mod fetch;
mod optimize;
mod report;
mod validate;

use stockcast_application::AppError;
use std::path::PathBuf;

pub enum Command {
    Backtest {
        config: PathBuf,
        out: Option<PathBuf>,
    },
    Optimize {
        config: PathBuf,
        out: Option<PathBuf>,
        top: usize,
    },
    Fetch {
        config: PathBuf,
        refresh: bool,
    },
    CacheStats {
        config: PathBuf,
    },
    CacheClear {
        config: PathBuf,
        symbol: Option<String>,
    },
    Validate {
        config: PathBuf,
    },
    Report {
        input: PathBuf,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Backtest { .. } => "backtest",
            Command::Optimize { .. } => "optimize",
            Command::Fetch { .. } => "fetch",
            Command::CacheStats { .. } => "cache_stats",
            Command::CacheClear { .. } => "cache_clear",
            Command::Validate { .. } => "validate",
            Command::Report { .. } => "report",
        }
    }
}

pub fn run(command: Command) -> Result<(), AppError> {
    metrics::counter!("stockcast.cli.commands_total", "command" => command.name()).increment(1);
    match command {
        Command::Backtest { config, out } => backtest::run_backtest(config, out),
        Command::Optimize { config, out, top } => optimize::run_optimize(config, out, top),
        Command::Fetch { config, refresh } => fetch::run_fetch(config, refresh),
        Command::CacheStats { config } => cache::run_stats(config),
        Command::CacheClear { config, symbol } => cache::run_clear(config, symbol),
        Command::Validate { config } => validate::run_validate(config),
        Command::Report { input } => report::run_report(input),
    }
}
