use crate::value_objects::prediction::Prediction;
use serde::{Deserialize, Serialize};

/// Output of one walk-forward step. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub timestamp: i64,
    pub symbol: String,
    pub prediction: Prediction,
    pub confidence: f64,
    pub current_price: f64,
}

impl Signal {
    pub fn new(
        timestamp: i64,
        symbol: impl Into<String>,
        prediction: Prediction,
        confidence: f64,
        current_price: f64,
    ) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            timestamp,
            symbol: symbol.into(),
            prediction,
            confidence,
            current_price,
        }
    }
}
