pub mod ensemble;
pub mod random;
pub mod rules;

use crate::error::DomainError;
use crate::services::features::Indicators;
use crate::value_objects::bar::Bar;
use crate::value_objects::prediction::Prediction;

pub use ensemble::EnsembleModel;
pub use random::RandomModel;
pub use rules::{MacdModel, MeanReversionModel, MomentumModel, TrendModel};

/// Rows visible to a model at one walk-forward step, oldest first.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    pub bars: &'a [Bar],
    pub indicators: &'a [Indicators],
}

impl<'a> History<'a> {
    pub fn new(bars: &'a [Bar], indicators: &'a [Indicators]) -> Self {
        debug_assert_eq!(bars.len(), indicators.len());
        Self { bars, indicators }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_bar(&self) -> Option<&'a Bar> {
        self.bars.last()
    }

    pub fn latest(&self) -> Option<&'a Indicators> {
        self.indicators.last()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelPrediction {
    pub prediction: Prediction,
    pub confidence: f64,
}

impl ModelPrediction {
    pub fn new(prediction: Prediction, confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            prediction,
            confidence,
        }
    }

    pub fn hold(confidence: f64) -> Self {
        Self::new(Prediction::Hold, confidence)
    }

    /// Buy for positive scores, Sell for negative, Hold at zero.
    fn from_score(score: f64, confidence: f64) -> Self {
        if score > 0.0 {
            Self::new(Prediction::Buy, confidence)
        } else if score < 0.0 {
            Self::new(Prediction::Sell, confidence)
        } else {
            Self::hold(confidence)
        }
    }
}

pub trait SignalModel {
    fn name(&self) -> &str;

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelSettings {
    pub seed: u64,
    pub momentum_threshold: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            seed: 42,
            momentum_threshold: 0.02,
        }
    }
}

pub const MODEL_NAMES: [&str; 6] = [
    "trend",
    "momentum",
    "mean_reversion",
    "macd",
    "random",
    "ensemble",
];

#[derive(Debug, Clone)]
pub enum ModelKind {
    Trend(TrendModel),
    Momentum(MomentumModel),
    MeanReversion(MeanReversionModel),
    Macd(MacdModel),
    Random(RandomModel),
    Ensemble(EnsembleModel),
}

impl ModelKind {
    pub fn from_name(name: &str, settings: &ModelSettings) -> Result<Self, DomainError> {
        match name.trim().to_lowercase().as_str() {
            "trend" => Ok(Self::Trend(TrendModel)),
            "momentum" => Ok(Self::Momentum(MomentumModel::new(
                settings.momentum_threshold,
            )?)),
            "mean_reversion" => Ok(Self::MeanReversion(MeanReversionModel::default())),
            "macd" => Ok(Self::Macd(MacdModel)),
            "random" => Ok(Self::Random(RandomModel::new(settings.seed))),
            "ensemble" => Ok(Self::Ensemble(EnsembleModel::standard(settings)?)),
            other => Err(DomainError::invalid(
                "model.kind",
                format!("unknown model {other} (expected one of {})", MODEL_NAMES.join(", ")),
            )),
        }
    }
}

impl SignalModel for ModelKind {
    fn name(&self) -> &str {
        match self {
            ModelKind::Trend(model) => model.name(),
            ModelKind::Momentum(model) => model.name(),
            ModelKind::MeanReversion(model) => model.name(),
            ModelKind::Macd(model) => model.name(),
            ModelKind::Random(model) => model.name(),
            ModelKind::Ensemble(model) => model.name(),
        }
    }

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
        match self {
            ModelKind::Trend(model) => model.predict(history),
            ModelKind::Momentum(model) => model.predict(history),
            ModelKind::MeanReversion(model) => model.predict(history),
            ModelKind::Macd(model) => model.predict(history),
            ModelKind::Random(model) => model.predict(history),
            ModelKind::Ensemble(model) => model.predict(history),
        }
    }
}
