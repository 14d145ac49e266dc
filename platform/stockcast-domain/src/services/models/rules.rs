use super::{History, ModelPrediction, SignalModel};
use crate::error::DomainError;
use crate::value_objects::prediction::Prediction;

/// Relative SMA spread that maps to full confidence.
const TREND_FULL_SPREAD: f64 = 0.02;
/// MACD histogram as a fraction of price that maps to full confidence.
const MACD_FULL_STRENGTH: f64 = 0.005;

/// Short SMA above long SMA is bullish.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrendModel;

impl SignalModel for TrendModel {
    fn name(&self) -> &str {
        "trend"
    }

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
        let Some(latest) = history.latest() else {
            return ModelPrediction::hold(0.0);
        };
        let (Some(short), Some(long)) = (latest.sma_10, latest.sma_20) else {
            return ModelPrediction::hold(0.0);
        };
        if long <= 0.0 {
            return ModelPrediction::hold(0.0);
        }
        let spread = short / long - 1.0;
        ModelPrediction::from_score(spread, spread.abs() / TREND_FULL_SPREAD)
    }
}

/// Return over the visible window compared against a symmetric threshold.
#[derive(Debug, Clone, Copy)]
pub struct MomentumModel {
    threshold: f64,
}

impl MomentumModel {
    pub fn new(threshold: f64) -> Result<Self, DomainError> {
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(DomainError::invalid(
                "momentum_threshold",
                format!("must be > 0, got {threshold}"),
            ));
        }
        Ok(Self { threshold })
    }
}

impl SignalModel for MomentumModel {
    fn name(&self) -> &str {
        "momentum"
    }

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
        let (Some(first), Some(last)) = (history.bars.first(), history.bars.last()) else {
            return ModelPrediction::hold(0.0);
        };
        if history.len() < 2 || first.close <= 0.0 {
            return ModelPrediction::hold(0.0);
        }
        let window_return = last.close / first.close - 1.0;
        if window_return > self.threshold {
            ModelPrediction::new(Prediction::Buy, window_return / (3.0 * self.threshold))
        } else if window_return < -self.threshold {
            ModelPrediction::new(Prediction::Sell, -window_return / (3.0 * self.threshold))
        } else {
            ModelPrediction::hold(0.5 * (1.0 - window_return.abs() / self.threshold))
        }
    }
}

/// Oversold/overbought RSI, falling back to Bollinger band breaches.
#[derive(Debug, Clone, Copy)]
pub struct MeanReversionModel {
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for MeanReversionModel {
    fn default() -> Self {
        Self {
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

impl SignalModel for MeanReversionModel {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
        let (Some(latest), Some(bar)) = (history.latest(), history.last_bar()) else {
            return ModelPrediction::hold(0.0);
        };

        if let Some(rsi) = latest.rsi_14 {
            if rsi < self.oversold {
                return ModelPrediction::new(
                    Prediction::Buy,
                    0.5 + (self.oversold - rsi) / self.oversold,
                );
            }
            if rsi > self.overbought {
                return ModelPrediction::new(
                    Prediction::Sell,
                    0.5 + (rsi - self.overbought) / (100.0 - self.overbought),
                );
            }
        }

        match (latest.bb_lower, latest.bb_upper) {
            (Some(lower), Some(_)) if bar.close < lower => {
                ModelPrediction::new(Prediction::Buy, 0.6)
            }
            (Some(_), Some(upper)) if bar.close > upper => {
                ModelPrediction::new(Prediction::Sell, 0.6)
            }
            (Some(_), Some(_)) => ModelPrediction::hold(0.3),
            _ => ModelPrediction::hold(0.0),
        }
    }
}

/// Sign of the MACD histogram.
#[derive(Debug, Clone, Copy, Default)]
pub struct MacdModel;

impl SignalModel for MacdModel {
    fn name(&self) -> &str {
        "macd"
    }

    fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
        let (Some(latest), Some(bar)) = (history.latest(), history.last_bar()) else {
            return ModelPrediction::hold(0.0);
        };
        let Some(histogram) = latest.macd_histogram else {
            return ModelPrediction::hold(0.0);
        };
        if bar.close <= 0.0 {
            return ModelPrediction::hold(0.0);
        }
        let strength = histogram.abs() / bar.close;
        ModelPrediction::from_score(histogram, strength / MACD_FULL_STRENGTH)
    }
}
