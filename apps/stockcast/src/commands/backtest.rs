use stockcast_application::reporting::render_summary;
use stockcast_application::AppError;
use stockcast_domain::engine_name;
use std::path::PathBuf;
use std::time::Instant;

pub(super) fn run_backtest(config_path: PathBuf, out: Option<PathBuf>) -> Result<(), AppError> {
    let config = super::common::load_valid_config(&config_path)?;
    super::common::print_config_summary("backtest", &config, out.as_ref());

    let overall_start = Instant::now();
    let deps = crate::infra::build_engine_deps(&config)?;
    let loader = deps.loader();
    let outcome = stockcast_application::backtesting::run_backtest(
        &config,
        out,
        &loader,
        deps.artifacts.as_ref(),
    )?;

    println!(
        "data: source={:?}, rows={}, signals={}",
        outcome.load.source,
        outcome.load.rows,
        outcome.run.signals.len()
    );
    print!(
        "{}",
        render_summary(&outcome.run.metrics, &outcome.run.trades, Some(&outcome.run.skipped))
    );
    println!("run output: {}", outcome.run_dir.display());
    println!(
        "{} cli: backtest total_ms={}",
        engine_name(),
        overall_start.elapsed().as_millis()
    );
    Ok(())
}
