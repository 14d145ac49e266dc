use stockcast_application::AppError;
use stockcast_domain::repositories::cache::PriceCache;
use std::path::PathBuf;

pub(super) fn run_stats(config_path: PathBuf) -> Result<(), AppError> {
    let config = super::common::load_valid_config(&config_path)?;
    let cache = crate::infra::open_cache(&config)?;
    let stats = cache.stats()?;
    if stats.is_empty() {
        println!("cache {} is empty", config.cache.path);
        return Ok(());
    }
    println!("cache {}:", config.cache.path);
    for stat in stats {
        println!(
            "  {:<8} {:<4} rows={:<6} {}..{}",
            stat.symbol,
            stat.interval,
            stat.rows,
            stat.first_date.map(|d| d.to_string()).unwrap_or_default(),
            stat.last_date.map(|d| d.to_string()).unwrap_or_default()
        );
    }
    Ok(())
}

pub(super) fn run_clear(config_path: PathBuf, symbol: Option<String>) -> Result<(), AppError> {
    let config = super::common::load_valid_config(&config_path)?;
    let cache = crate::infra::open_cache(&config)?;
    let removed = cache.clear(symbol.as_deref())?;
    println!(
        "removed {removed} cached rows ({})",
        symbol.as_deref().unwrap_or("all symbols")
    );
    Ok(())
}
