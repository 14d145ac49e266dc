use crate::config::Config;
use crate::error::AppError;
use crate::loader::{HistoricalDataLoader, LoadOutcome, LoadRequest};
use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stockcast_domain::entities::metrics::{MetricsConfig, PerformanceMetrics};
use stockcast_domain::repositories::artifacts::ArtifactWriter;
use stockcast_domain::services::engine::{
    BacktestPredictionEngine, SimulatorConfig, SkipReason, TradingSimulator,
};
use stockcast_domain::services::features::MarketFrame;
use stockcast_domain::services::models::{ModelKind, SignalModel};
use stockcast_domain::value_objects::equity_point::EquityPoint;
use stockcast_domain::value_objects::interval::Frequency;
use stockcast_domain::value_objects::signal::Signal;
use stockcast_domain::value_objects::trade::Trade;
use stockcast_domain::DomainError;
use tracing::info_span;

/// Everything needed to turn a frame into a simulated run.
#[derive(Debug, Clone)]
pub struct BacktestPlan {
    pub model: ModelKind,
    pub frequency: Frequency,
    pub lookback_days: usize,
    pub simulator: SimulatorConfig,
    pub metrics: MetricsConfig,
}

impl BacktestPlan {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self {
            model: config.model.build()?,
            frequency: config.backtest.frequency,
            lookback_days: config.backtest.lookback_days,
            simulator: config.trading.simulator_config(),
            metrics: config.metrics_config(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct BacktestRun {
    pub model: String,
    pub signals: Vec<Signal>,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub metrics: PerformanceMetrics,
    pub skipped: BTreeMap<SkipReason, usize>,
}

/// Walk-forward prediction followed by simulation over `[start, end]`.
///
/// Rows before `start` serve as history only. The plan's model is cloned, so
/// a seeded model replays identically on every call.
pub fn backtest_frame(
    frame: &MarketFrame,
    start: NaiveDate,
    end: NaiveDate,
    plan: &BacktestPlan,
) -> Result<BacktestRun, DomainError> {
    let mut engine = BacktestPredictionEngine::new(plan.model.clone());
    let signals =
        engine.walk_forward_backtest(frame, start, end, plan.frequency, plan.lookback_days)?;

    let mut simulator = TradingSimulator::new(plan.simulator, plan.metrics)?;
    let metrics = simulator.run(&frame.bars, &signals, start, end)?;

    Ok(BacktestRun {
        model: engine.model().name().to_string(),
        signals,
        trades: simulator.trades().to_vec(),
        equity: simulator.equity_curve().to_vec(),
        metrics,
        skipped: simulator.skipped().clone(),
    })
}

#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub run_dir: PathBuf,
    pub load: LoadOutcome,
    pub run: BacktestRun,
}

/// First date fetched for a run: `start` minus the configured warm-up buffer.
pub fn history_start(start: NaiveDate, warmup_days: u32) -> NaiveDate {
    start
        .checked_sub_days(Days::new(u64::from(warmup_days)))
        .unwrap_or(start)
}

pub fn run_backtest(
    config: &Config,
    out: Option<PathBuf>,
    loader: &HistoricalDataLoader<'_>,
    artifacts: &dyn ArtifactWriter,
) -> Result<BacktestOutcome, AppError> {
    let _span = info_span!(
        "run_backtest",
        run_id = %config.run.run_id,
        symbol = %config.run.symbol,
        interval = config.run.interval.as_str()
    )
    .entered();

    let plan = BacktestPlan::from_config(config)?;
    let request = LoadRequest {
        symbol: config.run.symbol.clone(),
        start: history_start(config.run.start, config.data.warmup_days),
        end: config.run.end,
        interval: config.run.interval,
    };

    let stage_start = Instant::now();
    let (frame, load) = loader.load_with_outcome(&request);
    metrics::histogram!("stockcast.backtest.load_ms")
        .record(stage_start.elapsed().as_secs_f64() * 1000.0);
    if frame.is_empty() {
        return Err(DomainError::InsufficientData(format!(
            "no price data for {} between {} and {}{}",
            request.symbol,
            request.start,
            request.end,
            load.error
                .as_deref()
                .map(|err| format!(" ({err})"))
                .unwrap_or_default()
        ))
        .into());
    }

    let stage_start = Instant::now();
    let run = backtest_frame(&frame, config.run.start, config.run.end, &plan)?;
    let engine_ms = stage_start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!("stockcast.backtest.engine_ms").record(engine_ms);
    metrics::counter!("stockcast.backtest.runs_total").increment(1);
    metrics::gauge!("stockcast.backtest.signals").set(run.signals.len() as f64);
    metrics::gauge!("stockcast.backtest.trades").set(run.metrics.total_trades as f64);

    tracing::info!(
        model = %run.model,
        rows = frame.len(),
        signals = run.signals.len(),
        fills = run.metrics.total_trades,
        total_return_pct = run.metrics.total_return_pct,
        engine_ms,
        "backtest complete"
    );

    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    write_outputs(config, &plan, &load, &run, &run_dir, artifacts)?;

    Ok(BacktestOutcome { run_dir, load, run })
}

fn write_outputs(
    config: &Config,
    plan: &BacktestPlan,
    load: &LoadOutcome,
    run: &BacktestRun,
    run_dir: &Path,
    artifacts: &dyn ArtifactWriter,
) -> Result<(), AppError> {
    artifacts.ensure_dir(run_dir)?;
    artifacts.write_signals_csv(&run_dir.join("signals.csv"), &run.signals)?;
    artifacts.write_trades_csv(&run_dir.join("trades.csv"), &run.trades)?;
    artifacts.write_equity_csv(&run_dir.join("equity.csv"), &run.equity)?;

    let skipped: BTreeMap<&str, usize> = run
        .skipped
        .iter()
        .map(|(reason, count)| (reason.as_str(), *count))
        .collect();
    let meta = serde_json::json!({
        "run_id": config.run.run_id,
        "symbol": config.run.symbol,
        "interval": config.run.interval.as_str(),
        "start": config.run.start.to_string(),
        "end": config.run.end.to_string(),
        "model": run.model,
        "frequency": plan.frequency,
        "lookback_days": plan.lookback_days,
        "data_source": load.source,
        "rows_loaded": load.rows,
        "signals": run.signals.len(),
        "skipped": skipped,
    });
    artifacts.write_summary_json(&run_dir.join("summary.json"), &run.metrics, Some(&meta))?;
    Ok(())
}
