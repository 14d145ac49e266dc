use stockcast_application::reporting::{generate_report, render_summary};
use stockcast_application::AppError;
use stockcast_domain::engine_name;
use std::path::PathBuf;

pub(super) fn run_report(input: PathBuf) -> Result<(), AppError> {
    let reader = crate::infra::build_reader();
    let report = generate_report(input.as_path(), reader.as_ref())?;
    println!(
        "{} cli: report {} (equity_points={})",
        engine_name(),
        report.input_dir.display(),
        report.equity_points
    );
    print!("{}", render_summary(&report.metrics, &report.trades, None));
    Ok(())
}
