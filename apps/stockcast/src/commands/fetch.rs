use stockcast_application::backtesting::history_start;
use stockcast_application::loader::LoadRequest;
use stockcast_application::AppError;
use stockcast_domain::DomainError;
use std::path::PathBuf;

pub(super) fn run_fetch(config_path: PathBuf, refresh: bool) -> Result<(), AppError> {
    let config = super::common::load_valid_config(&config_path)?;
    super::common::print_config_summary("fetch", &config, None);

    let mut deps = crate::infra::build_engine_deps(&config)?;
    deps.refresh |= refresh;
    let loader = deps.loader();
    let request = LoadRequest {
        symbol: config.run.symbol.clone(),
        start: history_start(config.run.start, config.data.warmup_days),
        end: config.run.end,
        interval: config.run.interval,
    };
    let (frame, outcome) = loader.load_with_outcome(&request);
    if frame.is_empty() {
        return Err(DomainError::InsufficientData(format!(
            "no price data for {} between {} and {}: {}",
            request.symbol,
            request.start,
            request.end,
            outcome.error.as_deref().unwrap_or("provider returned no rows")
        ))
        .into());
    }

    println!(
        "fetched {} rows for {} ({}..{}) from {:?}",
        outcome.rows,
        request.symbol,
        frame.bars.first().map(|b| b.date().to_string()).unwrap_or_default(),
        frame.bars.last().map(|b| b.date().to_string()).unwrap_or_default(),
        outcome.source
    );
    if let Some(quality) = &outcome.quality {
        println!(
            "quality: duplicates={}, out_of_order={}, invalid_close={}, gaps={}, missing_bars={}",
            quality.duplicates,
            quality.out_of_order,
            quality.invalid_close,
            quality.gaps,
            quality.missing_bars
        );
    }
    Ok(())
}
