use stockcast_application::optimization::{OptimizationMetric, ParameterSpace};
use stockcast_application::AppError;
use std::path::PathBuf;

pub(super) fn run_validate(config_path: PathBuf) -> Result<(), AppError> {
    let config = super::common::load_valid_config(&config_path)?;
    super::common::print_config_summary("validate", &config, None);

    if let Some(optimizer) = &config.optimizer {
        let metric = OptimizationMetric::parse(&optimizer.metric)?;
        let space = ParameterSpace::from(&optimizer.space);
        space.validate()?;
        println!(
            "optimizer: method={:?}, metric={}, combinations={}, train_ratio={}, embargo_days={}",
            optimizer.method,
            metric.as_str(),
            space.len(),
            optimizer.train_ratio,
            optimizer.embargo_days
        );
    }
    println!("config ok");
    Ok(())
}
