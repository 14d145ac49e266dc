use stockcast_application::config::{load_config, Config};
use stockcast_application::AppError;
use stockcast_domain::engine_name;
use std::path::{Path, PathBuf};

/// Loads and validates a config file.
pub(super) fn load_valid_config(path: &Path) -> Result<Config, AppError> {
    let config = load_config(path)?;
    config.validate()?;
    Ok(config)
}

pub(super) fn print_config_summary(command: &str, config: &Config, out: Option<&PathBuf>) {
    println!(
        "{} cli: {} (run_id={}, symbol={}, interval={}, {}..{})",
        engine_name(),
        command,
        config.run.run_id,
        config.run.symbol,
        config.run.interval,
        config.run.start,
        config.run.end
    );
    println!(
        "data: provider={:?}, warmup_days={}, refresh={}, cache={}",
        config.data.provider,
        config.data.warmup_days,
        config.data.refresh,
        if config.cache.enabled {
            config.cache.path.as_str()
        } else {
            "disabled"
        }
    );
    println!(
        "model: kind={}, seed={}, frequency={:?}, lookback_days={}",
        config.model.kind,
        config.model.seed,
        config.backtest.frequency,
        config.backtest.lookback_days
    );
    let trading = &config.trading;
    println!(
        "trading: initial_capital={}, commission_rate={}, slippage_rate={}, max_position_size={}, min_confidence={}, stop_loss_pct={}, take_profit_pct={}",
        trading.initial_capital,
        trading.commission_rate,
        trading.slippage_rate,
        trading.max_position_size,
        trading.min_confidence,
        trading
            .stop_loss_pct
            .map_or_else(|| "none".to_string(), |v| v.to_string()),
        trading
            .take_profit_pct
            .map_or_else(|| "none".to_string(), |v| v.to_string())
    );
    println!(
        "output dir: {}",
        out.map(|p| p.display().to_string())
            .unwrap_or_else(|| config.paths.out_dir.clone())
    );
}
