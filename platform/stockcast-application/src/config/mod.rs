use crate::error::AppError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use stockcast_domain::entities::metrics::MetricsConfig;
use stockcast_domain::services::engine::SimulatorConfig;
use stockcast_domain::services::models::{ModelKind, ModelSettings};
use stockcast_domain::services::split::DEFAULT_EMBARGO;
use stockcast_domain::value_objects::interval::{Frequency, Interval};

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub run: RunConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub backtest: BacktestConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub trading: TradingConfig,
    pub metrics: Option<MetricsSection>,
    pub optimizer: Option<OptimizerConfig>,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub run_id: String,
    pub symbol: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    #[serde(default = "default_interval")]
    pub interval: Interval,
}

fn default_interval() -> Interval {
    Interval::OneDay
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Yahoo,
    Csv,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct DataConfig {
    pub provider: ProviderKind,
    pub csv_dir: Option<String>,
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    pub retries: u32,
    /// Calendar days fetched before `run.start` so indicators are warm.
    pub warmup_days: u32,
    pub refresh: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Yahoo,
            csv_dir: None,
            base_url: None,
            timeout_ms: 10_000,
            retries: 2,
            warmup_days: 90,
            refresh: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "cache/ohlcv.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct BacktestConfig {
    pub frequency: Frequency,
    pub lookback_days: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            frequency: Frequency::Daily,
            lookback_days: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct ModelConfig {
    pub kind: String,
    pub seed: u64,
    pub momentum_threshold: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        let settings = ModelSettings::default();
        Self {
            kind: "ensemble".to_string(),
            seed: settings.seed,
            momentum_threshold: settings.momentum_threshold,
        }
    }
}

impl ModelConfig {
    pub fn settings(&self) -> ModelSettings {
        ModelSettings {
            seed: self.seed,
            momentum_threshold: self.momentum_threshold,
        }
    }

    pub fn build(&self) -> Result<ModelKind, AppError> {
        Ok(ModelKind::from_name(&self.kind, &self.settings())?)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct TradingConfig {
    pub initial_capital: f64,
    pub commission_rate: f64,
    pub slippage_rate: f64,
    pub max_position_size: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub min_confidence: f64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        let sim = SimulatorConfig::default();
        Self {
            initial_capital: sim.initial_capital,
            commission_rate: sim.commission_rate,
            slippage_rate: sim.slippage_rate,
            max_position_size: sim.max_position_size,
            stop_loss_pct: sim.stop_loss_pct,
            take_profit_pct: sim.take_profit_pct,
            min_confidence: sim.min_confidence,
        }
    }
}

impl TradingConfig {
    pub fn simulator_config(&self) -> SimulatorConfig {
        SimulatorConfig {
            initial_capital: self.initial_capital,
            commission_rate: self.commission_rate,
            slippage_rate: self.slippage_rate,
            max_position_size: self.max_position_size,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
            min_confidence: self.min_confidence,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    pub risk_free_rate: Option<f64>,
    pub annualization_factor: Option<f64>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    Grid,
    Random,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct OptimizerConfig {
    pub method: SearchMethod,
    pub iterations: usize,
    pub seed: u64,
    pub metric: String,
    pub train_ratio: f64,
    pub embargo_days: usize,
    pub space: SpaceConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            method: SearchMethod::Grid,
            iterations: 20,
            seed: 42,
            metric: "total_return".to_string(),
            train_ratio: 0.7,
            embargo_days: DEFAULT_EMBARGO,
            space: SpaceConfig::default(),
        }
    }
}

/// Candidate values per tuned parameter. An empty exit list means "no stop".
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct SpaceConfig {
    pub confidence_thresholds: Vec<f64>,
    pub lookback_days: Vec<usize>,
    pub max_position_sizes: Vec<f64>,
    pub stop_loss_pcts: Vec<f64>,
    pub take_profit_pcts: Vec<f64>,
}

impl Default for SpaceConfig {
    fn default() -> Self {
        Self {
            confidence_thresholds: vec![0.5, 0.6, 0.7],
            lookback_days: vec![5, 10, 20],
            max_position_sizes: vec![0.1, 0.25, 0.5],
            stop_loss_pcts: Vec::new(),
            take_profit_pcts: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(deny_unknown_fields, default)]
pub struct PathsConfig {
    pub out_dir: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            out_dir: "runs".to_string(),
        }
    }
}

impl Config {
    /// Metric settings; the annualization factor defaults to the bar interval's
    /// periods per year.
    pub fn metrics_config(&self) -> MetricsConfig {
        let defaults = MetricsConfig {
            annualization_factor: Some(self.run.interval.periods_per_year()),
            ..MetricsConfig::default()
        };
        match &self.metrics {
            Some(section) => MetricsConfig {
                risk_free_rate: section.risk_free_rate.unwrap_or(defaults.risk_free_rate),
                annualization_factor: section
                    .annualization_factor
                    .or(defaults.annualization_factor),
            },
            None => defaults,
        }
    }

    pub fn run_dir(&self) -> PathBuf {
        Path::new(&self.paths.out_dir).join(&self.run.run_id)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.run.run_id.trim().is_empty() {
            return Err(AppError::config("run.run_id must not be empty"));
        }
        if self.run.symbol.trim().is_empty() {
            return Err(AppError::config("run.symbol must not be empty"));
        }
        if self.run.start > self.run.end {
            return Err(AppError::config(format!(
                "run.start ({}) is after run.end ({})",
                self.run.start, self.run.end
            )));
        }
        if self.data.provider == ProviderKind::Csv && self.data.csv_dir.is_none() {
            return Err(AppError::config("data.csv_dir is required when data.provider = \"csv\""));
        }
        if self.data.timeout_ms == 0 {
            return Err(AppError::config("data.timeout_ms must be > 0"));
        }
        if self.backtest.lookback_days == 0 {
            return Err(AppError::config("backtest.lookback_days must be >= 1"));
        }
        self.trading
            .simulator_config()
            .validate()
            .map_err(|err| AppError::config(format!("trading: {err}")))?;
        self.model
            .build()
            .map_err(|err| AppError::config(format!("model: {err}")))?;
        if let Some(metrics) = &self.metrics {
            if let Some(factor) = metrics.annualization_factor {
                if !factor.is_finite() || factor <= 0.0 {
                    return Err(AppError::config("metrics.annualization_factor must be > 0"));
                }
            }
        }
        if let Some(optimizer) = &self.optimizer {
            validate_optimizer(optimizer)?;
        }
        Ok(())
    }
}

fn validate_optimizer(optimizer: &OptimizerConfig) -> Result<(), AppError> {
    if !(optimizer.train_ratio > 0.0 && optimizer.train_ratio < 1.0) {
        return Err(AppError::config("optimizer.train_ratio must be in (0, 1)"));
    }
    if optimizer.method == SearchMethod::Random && optimizer.iterations == 0 {
        return Err(AppError::config("optimizer.iterations must be >= 1 for random search"));
    }
    crate::optimization::OptimizationMetric::parse(&optimizer.metric)?;
    crate::optimization::ParameterSpace::from(&optimizer.space).validate()
}

pub fn load_config(path: &Path) -> Result<Config, AppError> {
    let (config, _source) = load_config_with_source(path)?;
    Ok(config)
}

pub fn load_config_with_source(path: &Path) -> Result<(Config, String), AppError> {
    let contents = fs::read_to_string(path).map_err(|source| AppError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config: Config = toml::from_str(&contents)?;
    Ok((config, contents))
}
