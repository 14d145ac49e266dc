use stockcast_application::reporting::render_leaderboard;
use stockcast_application::AppError;
use stockcast_domain::engine_name;
use std::path::PathBuf;
use std::time::Instant;

pub(super) fn run_optimize(config_path: PathBuf, out: Option<PathBuf>, top: usize) -> Result<(), AppError> {
    let config = super::common::load_valid_config(&config_path)?;
    super::common::print_config_summary("optimize", &config, out.as_ref());

    let overall_start = Instant::now();
    let deps = crate::infra::build_engine_deps(&config)?;
    let loader = deps.loader();
    let (run_dir, report) = stockcast_application::optimization::run_optimization(
        &config,
        out,
        &loader,
        deps.artifacts.as_ref(),
    )?;

    print!("{}", render_leaderboard(&report, top));
    println!("run output: {}", run_dir.display());
    println!(
        "{} cli: optimize evaluated={} total_ms={}",
        engine_name(),
        report.evaluations.len(),
        overall_start.elapsed().as_millis()
    );
    Ok(())
}
