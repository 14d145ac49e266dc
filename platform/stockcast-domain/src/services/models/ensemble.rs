use super::rules::{MacdModel, MeanReversionModel, MomentumModel, TrendModel};
use super::{History, ModelKind, ModelPrediction, ModelSettings, SignalModel};
use crate::error::DomainError;
use crate::value_objects::prediction::Prediction;

/// Net weighted score needed before the ensemble leaves HOLD.
pub const DECISION_BAND: f64 = 0.1;

/// Confidence-weighted vote over member models.
#[derive(Debug, Clone)]
pub struct EnsembleModel {
    members: Vec<(ModelKind, f64)>,
}

impl EnsembleModel {
    pub fn new(members: Vec<(ModelKind, f64)>) -> Result<Self, DomainError> {
        if members.is_empty() {
            return Err(DomainError::invalid("ensemble", "needs at least one member"));
        }
        if let Some((_, weight)) = members.iter().find(|(_, w)| !w.is_finite() || *w <= 0.0) {
            return Err(DomainError::invalid(
                "ensemble",
                format!("member weights must be > 0, got {weight}"),
            ));
        }
        Ok(Self { members })
    }

    /// Trend, momentum, mean reversion and MACD with equal weights.
    pub fn standard(settings: &ModelSettings) -> Result<Self, DomainError> {
        Self::new(vec![
            (ModelKind::Trend(TrendModel), 1.0),
            (
                ModelKind::Momentum(MomentumModel::new(settings.momentum_threshold)?),
                1.0,
            ),
            (ModelKind::MeanReversion(MeanReversionModel::default()), 1.0),
            (ModelKind::Macd(MacdModel), 1.0),
        ])
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|(model, _)| model.name()).collect()
    }
}

impl SignalModel for EnsembleModel {
    fn name(&self) -> &str {
        "ensemble"
    }

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
        let total_weight: f64 = self.members.iter().map(|(_, w)| *w).sum();
        let votes: Vec<(ModelPrediction, f64)> = self
            .members
            .iter_mut()
            .map(|(model, weight)| (model.predict(history), *weight))
            .collect();

        let score = votes
            .iter()
            .map(|(vote, weight)| vote.prediction.direction() * vote.confidence * weight)
            .sum::<f64>()
            / total_weight;

        let decision = if score > DECISION_BAND {
            Prediction::Buy
        } else if score < -DECISION_BAND {
            Prediction::Sell
        } else {
            Prediction::Hold
        };

        let conviction: f64 = votes.iter().map(|(v, w)| v.confidence * w).sum();
        if conviction <= 0.0 {
            return ModelPrediction::hold(0.0);
        }
        let agreeing: f64 = votes
            .iter()
            .filter(|(v, _)| v.prediction == decision)
            .map(|(v, w)| v.confidence * w)
            .sum();
        ModelPrediction::new(decision, agreeing / conviction)
    }
}
