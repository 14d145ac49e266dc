use crate::backtesting::{backtest_frame, history_start, BacktestPlan};
use crate::config::{Config, OptimizerConfig, SearchMethod, SpaceConfig};
use crate::error::AppError;
use crate::loader::{HistoricalDataLoader, LoadRequest, LoadSource};
use chrono::NaiveDate;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Instant;
use stockcast_domain::entities::metrics::PerformanceMetrics;
use stockcast_domain::repositories::artifacts::ArtifactWriter;
use stockcast_domain::services::features::MarketFrame;
use stockcast_domain::services::split::{train_test_split, DEFAULT_EMBARGO};
use stockcast_domain::value_objects::parameters::{LeaderboardRow, ParameterSet};
use stockcast_domain::DomainError;
use tracing::info_span;

/// Candidate values per tuned parameter. `None` in an exit list means no exit.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    pub confidence_thresholds: Vec<f64>,
    pub lookback_days: Vec<usize>,
    pub max_position_sizes: Vec<f64>,
    pub stop_loss_pcts: Vec<Option<f64>>,
    pub take_profit_pcts: Vec<Option<f64>>,
}

impl From<&SpaceConfig> for ParameterSpace {
    fn from(space: &SpaceConfig) -> Self {
        let exits = |values: &[f64]| -> Vec<Option<f64>> {
            if values.is_empty() {
                vec![None]
            } else {
                values.iter().copied().map(Some).collect()
            }
        };
        Self {
            confidence_thresholds: space.confidence_thresholds.clone(),
            lookback_days: space.lookback_days.clone(),
            max_position_sizes: space.max_position_sizes.clone(),
            stop_loss_pcts: exits(&space.stop_loss_pcts),
            take_profit_pcts: exits(&space.take_profit_pcts),
        }
    }
}

impl ParameterSpace {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.confidence_thresholds.is_empty()
            || self.lookback_days.is_empty()
            || self.max_position_sizes.is_empty()
            || self.stop_loss_pcts.is_empty()
            || self.take_profit_pcts.is_empty()
        {
            return Err(AppError::config("optimizer.space: every dimension needs at least one value"));
        }
        if let Some(v) = self
            .confidence_thresholds
            .iter()
            .find(|v| !(0.0..=1.0).contains(*v))
        {
            return Err(AppError::config(format!(
                "optimizer.space.confidence_thresholds: {v} is outside [0, 1]"
            )));
        }
        if self.lookback_days.contains(&0) {
            return Err(AppError::config("optimizer.space.lookback_days: values must be >= 1"));
        }
        if let Some(v) = self
            .max_position_sizes
            .iter()
            .find(|v| !(**v > 0.0 && **v <= 1.0))
        {
            return Err(AppError::config(format!(
                "optimizer.space.max_position_sizes: {v} is outside (0, 1]"
            )));
        }
        for (name, values) in [
            ("stop_loss_pcts", &self.stop_loss_pcts),
            ("take_profit_pcts", &self.take_profit_pcts),
        ] {
            if let Some(v) = values.iter().flatten().find(|v| !(**v > 0.0 && v.is_finite())) {
                return Err(AppError::config(format!(
                    "optimizer.space.{name}: {v} must be > 0"
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.confidence_thresholds.len()
            * self.lookback_days.len()
            * self.max_position_sizes.len()
            * self.stop_loss_pcts.len()
            * self.take_profit_pcts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Full Cartesian product; the last dimension varies fastest.
    pub fn expand_grid(&self) -> Vec<ParameterSet> {
        let seed = ParameterSet {
            confidence_threshold: 0.0,
            lookback_days: 1,
            max_position_size: 1.0,
            stop_loss_pct: None,
            take_profit_pct: None,
        };
        let mut out = vec![seed];
        out = cross(out, &self.confidence_thresholds, |p, v| p.confidence_threshold = *v);
        out = cross(out, &self.lookback_days, |p, v| p.lookback_days = *v);
        out = cross(out, &self.max_position_sizes, |p, v| p.max_position_size = *v);
        out = cross(out, &self.stop_loss_pcts, |p, v| p.stop_loss_pct = *v);
        out = cross(out, &self.take_profit_pcts, |p, v| p.take_profit_pct = *v);
        out
    }
}

fn cross<T>(
    sets: Vec<ParameterSet>,
    values: &[T],
    apply: impl Fn(&mut ParameterSet, &T),
) -> Vec<ParameterSet> {
    let mut next = Vec::with_capacity(sets.len() * values.len());
    for base in &sets {
        for value in values {
            let mut set = *base;
            apply(&mut set, value);
            next.push(set);
        }
    }
    next
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMetric {
    TotalReturn,
    Sharpe,
    WinRate,
    ProfitFactor,
    /// Lower is better.
    MaxDrawdown,
}

impl OptimizationMetric {
    pub fn parse(value: &str) -> Result<Self, AppError> {
        match value.trim().to_lowercase().as_str() {
            "total_return" | "total_return_pct" | "return" => Ok(Self::TotalReturn),
            "sharpe" | "sharpe_ratio" => Ok(Self::Sharpe),
            "win_rate" => Ok(Self::WinRate),
            "profit_factor" => Ok(Self::ProfitFactor),
            "max_drawdown" | "max_drawdown_pct" => Ok(Self::MaxDrawdown),
            other => Err(AppError::config(format!(
                "unknown optimizer metric '{other}' (expected total_return, sharpe, win_rate, profit_factor or max_drawdown)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TotalReturn => "total_return",
            Self::Sharpe => "sharpe",
            Self::WinRate => "win_rate",
            Self::ProfitFactor => "profit_factor",
            Self::MaxDrawdown => "max_drawdown",
        }
    }

    /// A missing profit factor means no losing round trip: infinite with
    /// winners, zero without any.
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::TotalReturn => metrics.total_return_pct,
            Self::Sharpe => metrics.sharpe_ratio,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor.unwrap_or(if metrics.winning_trades > 0 {
                f64::INFINITY
            } else {
                0.0
            }),
            Self::MaxDrawdown => metrics.max_drawdown_pct,
        }
    }

    /// `Less` when `a` ranks ahead of `b`. Total over all floats; NaN ranks last.
    pub fn rank(&self, a: f64, b: f64) -> Ordering {
        let (a, b) = (self.comparable(a), self.comparable(b));
        match self {
            Self::MaxDrawdown => a.total_cmp(&b),
            _ => b.total_cmp(&a),
        }
    }

    fn comparable(&self, score: f64) -> f64 {
        match (score.is_nan(), self) {
            (false, _) => score,
            (true, Self::MaxDrawdown) => f64::INFINITY,
            (true, _) => f64::NEG_INFINITY,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStrategy {
    Grid,
    Random { iterations: usize, seed: u64 },
}

impl SearchStrategy {
    pub fn from_config(config: &OptimizerConfig) -> Self {
        match config.method {
            SearchMethod::Grid => Self::Grid,
            SearchMethod::Random => Self::Random {
                iterations: config.iterations,
                seed: config.seed,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Random { .. } => "random",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub params: ParameterSet,
    pub hash: String,
    pub score: f64,
    pub metrics: PerformanceMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SplitWindows {
    pub rows: usize,
    pub train_rows: usize,
    pub embargo_rows: usize,
    pub test_rows: usize,
    pub train_start: NaiveDate,
    pub train_end: NaiveDate,
    pub test_start: NaiveDate,
    pub test_end: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
pub struct OptimizationReport {
    pub symbol: String,
    pub metric: OptimizationMetric,
    pub method: &'static str,
    pub data_source: LoadSource,
    pub split: SplitWindows,
    /// Train-window results, best first.
    pub evaluations: Vec<Evaluation>,
    /// Best train parameters replayed on the test window.
    pub out_of_sample: Evaluation,
}

impl OptimizationReport {
    pub fn best(&self) -> Option<&Evaluation> {
        self.evaluations.first()
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardRow> {
        self.evaluations
            .iter()
            .enumerate()
            .map(|(idx, eval)| LeaderboardRow {
                rank: idx + 1,
                confidence_threshold: eval.params.confidence_threshold,
                lookback_days: eval.params.lookback_days,
                max_position_size: eval.params.max_position_size,
                stop_loss_pct: eval.params.stop_loss_pct,
                take_profit_pct: eval.params.take_profit_pct,
                score: eval.score,
                total_return_pct: eval.metrics.total_return_pct,
                sharpe_ratio: eval.metrics.sharpe_ratio,
                max_drawdown_pct: eval.metrics.max_drawdown_pct,
                win_rate: eval.metrics.win_rate,
                profit_factor: eval.metrics.profit_factor,
                total_trades: eval.metrics.total_trades,
            })
            .collect()
    }
}

/// Searches trading parameters on a train window and checks the winner on a
/// later test window separated by an embargo gap.
#[derive(Debug, Clone)]
pub struct ParameterOptimizer {
    base: BacktestPlan,
    metric: OptimizationMetric,
    train_ratio: f64,
    embargo: usize,
}

impl ParameterOptimizer {
    pub fn new(base: BacktestPlan, metric: OptimizationMetric) -> Self {
        Self {
            base,
            metric,
            train_ratio: 0.7,
            embargo: DEFAULT_EMBARGO,
        }
    }

    pub fn with_split(mut self, train_ratio: f64, embargo: usize) -> Self {
        self.train_ratio = train_ratio;
        self.embargo = embargo;
        self
    }

    pub fn metric(&self) -> OptimizationMetric {
        self.metric
    }

    fn plan_for(&self, params: &ParameterSet) -> BacktestPlan {
        let mut plan = self.base.clone();
        plan.lookback_days = params.lookback_days;
        plan.simulator.min_confidence = params.confidence_threshold;
        plan.simulator.max_position_size = params.max_position_size;
        plan.simulator.stop_loss_pct = params.stop_loss_pct;
        plan.simulator.take_profit_pct = params.take_profit_pct;
        plan
    }

    pub fn evaluate(
        &self,
        frame: &MarketFrame,
        start: NaiveDate,
        end: NaiveDate,
        params: &ParameterSet,
    ) -> Result<Evaluation, AppError> {
        let stage_start = Instant::now();
        let run = backtest_frame(frame, start, end, &self.plan_for(params))?;
        metrics::counter!("stockcast.optimizer.evaluations_total").increment(1);
        metrics::histogram!("stockcast.optimizer.evaluate_ms")
            .record(stage_start.elapsed().as_secs_f64() * 1000.0);

        let score = self.metric.score(&run.metrics);
        tracing::debug!(
            params = %params,
            score,
            fills = run.metrics.total_trades,
            "evaluated parameters"
        );
        Ok(Evaluation {
            params: *params,
            hash: parameter_hash(params),
            score,
            metrics: run.metrics,
        })
    }

    pub fn grid_search(
        &self,
        frame: &MarketFrame,
        start: NaiveDate,
        end: NaiveDate,
        space: &ParameterSpace,
    ) -> Result<Vec<Evaluation>, AppError> {
        space.validate()?;
        self.evaluate_all(frame, start, end, space.expand_grid())
    }

    /// `iterations` distinct grid points drawn with a seeded RNG.
    pub fn random_search(
        &self,
        frame: &MarketFrame,
        start: NaiveDate,
        end: NaiveDate,
        space: &ParameterSpace,
        iterations: usize,
        seed: u64,
    ) -> Result<Vec<Evaluation>, AppError> {
        space.validate()?;
        let grid = space.expand_grid();
        let mut rng = StdRng::seed_from_u64(seed);
        let picks = rand::seq::index::sample(&mut rng, grid.len(), iterations.min(grid.len()));
        let candidates = picks.into_iter().map(|idx| grid[idx]).collect();
        self.evaluate_all(frame, start, end, candidates)
    }

    fn evaluate_all(
        &self,
        frame: &MarketFrame,
        start: NaiveDate,
        end: NaiveDate,
        candidates: Vec<ParameterSet>,
    ) -> Result<Vec<Evaluation>, AppError> {
        let mut evaluations = candidates
            .iter()
            .map(|params| self.evaluate(frame, start, end, params))
            .collect::<Result<Vec<_>, _>>()?;
        evaluations.sort_by(|a, b| self.metric.rank(a.score, b.score));
        Ok(evaluations)
    }

    /// Loads `request` (including any warm-up rows before `trade_start`),
    /// splits the tradable rows into train / embargo / test, searches on
    /// train and replays the best parameters on test.
    pub fn optimize(
        &self,
        loader: &HistoricalDataLoader<'_>,
        request: &LoadRequest,
        trade_start: NaiveDate,
        space: &ParameterSpace,
        strategy: SearchStrategy,
    ) -> Result<OptimizationReport, AppError> {
        let _span = info_span!(
            "optimize",
            symbol = %request.symbol,
            metric = self.metric.as_str(),
            method = strategy.as_str()
        )
        .entered();
        let started = Instant::now();

        let (frame, load) = loader.load_with_outcome(request);
        let offset = frame
            .bars
            .iter()
            .position(|bar| bar.date() >= trade_start && bar.date() <= request.end)
            .ok_or_else(|| {
                DomainError::InsufficientData(format!(
                    "no price data for {} between {} and {}",
                    request.symbol, trade_start, request.end
                ))
            })?;
        let rows = frame
            .bars
            .iter()
            .skip(offset)
            .take_while(|bar| bar.date() <= request.end)
            .count();
        let split = train_test_split(rows, self.train_ratio, self.embargo)?;
        let date_at = |idx: usize| frame.bars[offset + idx].date();
        let windows = SplitWindows {
            rows,
            train_rows: split.train_len(),
            embargo_rows: split.embargo.len(),
            test_rows: split.test_len(),
            train_start: date_at(split.train.start),
            train_end: date_at(split.train.end - 1),
            test_start: date_at(split.test.start),
            test_end: date_at(split.test.end - 1),
        };
        tracing::info!(
            rows,
            train_rows = windows.train_rows,
            embargo_rows = windows.embargo_rows,
            test_rows = windows.test_rows,
            "split data"
        );

        // Nothing at or after the embargo is visible while searching.
        let train_frame = frame.truncated(offset + split.train.end);
        let evaluations = match strategy {
            SearchStrategy::Grid => {
                self.grid_search(&train_frame, windows.train_start, windows.train_end, space)?
            }
            SearchStrategy::Random { iterations, seed } => self.random_search(
                &train_frame,
                windows.train_start,
                windows.train_end,
                space,
                iterations,
                seed,
            )?,
        };
        let best = evaluations.first().ok_or_else(|| {
            AppError::config("optimizer search produced no evaluations")
        })?;

        let test_frame = frame.truncated(offset + split.test.end);
        let out_of_sample =
            self.evaluate(&test_frame, windows.test_start, windows.test_end, &best.params)?;

        metrics::histogram!("stockcast.optimizer.run_ms")
            .record(started.elapsed().as_secs_f64() * 1000.0);
        metrics::gauge!("stockcast.optimizer.best_score").set(best.score);
        tracing::info!(
            evaluated = evaluations.len(),
            best = %best.params,
            train_score = best.score,
            test_score = out_of_sample.score,
            "optimization complete"
        );

        Ok(OptimizationReport {
            symbol: request.symbol.clone(),
            metric: self.metric,
            method: strategy.as_str(),
            data_source: load.source,
            split: windows,
            evaluations,
            out_of_sample,
        })
    }
}

pub fn run_optimization(
    config: &Config,
    out: Option<PathBuf>,
    loader: &HistoricalDataLoader<'_>,
    artifacts: &dyn ArtifactWriter,
) -> Result<(PathBuf, OptimizationReport), AppError> {
    let settings = config.optimizer.clone().unwrap_or_default();
    let metric = OptimizationMetric::parse(&settings.metric)?;
    let optimizer = ParameterOptimizer::new(BacktestPlan::from_config(config)?, metric)
        .with_split(settings.train_ratio, settings.embargo_days);
    let space = ParameterSpace::from(&settings.space);
    let request = LoadRequest {
        symbol: config.run.symbol.clone(),
        start: history_start(config.run.start, config.data.warmup_days),
        end: config.run.end,
        interval: config.run.interval,
    };

    let report = optimizer.optimize(
        loader,
        &request,
        config.run.start,
        &space,
        SearchStrategy::from_config(&settings),
    )?;

    let base_dir = out.unwrap_or_else(|| PathBuf::from(&config.paths.out_dir));
    let run_dir = base_dir.join(&config.run.run_id);
    artifacts.ensure_dir(&run_dir)?;
    artifacts.write_leaderboard_csv(&run_dir.join("leaderboard.csv"), &report.leaderboard())?;
    let summary = serde_json::json!({
        "run_id": config.run.run_id,
        "symbol": report.symbol,
        "metric": report.metric,
        "method": report.method,
        "data_source": report.data_source,
        "split": report.split,
        "evaluated": report.evaluations.len(),
        "best": report.best(),
        "out_of_sample": report.out_of_sample,
    });
    artifacts.write_json(&run_dir.join("optimization.json"), &summary)?;
    Ok((run_dir, report))
}

/// Stable short id for a parameter set.
pub fn parameter_hash(params: &ParameterSet) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.to_string().as_bytes());
    let bytes = hasher.finalize();
    to_hex_short(&bytes[..], 12)
}

fn to_hex_short(bytes: &[u8], chars: usize) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(chars);
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        if out.len() >= chars {
            break;
        }
        out.push(HEX[(b & 0x0f) as usize] as char);
        if out.len() >= chars {
            break;
        }
    }
    out
}
