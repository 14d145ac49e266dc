pub mod rolling;

use crate::value_objects::bar::Bar;
use crate::value_objects::interval::Interval;
use rolling::{RollingEma, RollingRsi, RollingSma, RollingStd};
use serde::Serialize;

const BOLLINGER_WINDOW: usize = 20;
const BOLLINGER_WIDTH: f64 = 2.0;
const VOLATILITY_WINDOW: usize = 20;
const RSI_WINDOW: usize = 14;
const MACD_FAST: usize = 12;
const MACD_SLOW: usize = 26;
const MACD_SIGNAL: usize = 9;

/// Technical indicators for one row. Every value is computed from that row and
/// earlier rows only; `None` while a window is still warming up.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Indicators {
    pub returns: Option<f64>,
    pub sma_5: Option<f64>,
    pub sma_10: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub ema_12: Option<f64>,
    pub ema_26: Option<f64>,
    pub rsi_14: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub volatility_20: Option<f64>,
}

struct IndicatorPipeline {
    sma_5: RollingSma,
    sma_10: RollingSma,
    sma_20: RollingSma,
    sma_50: RollingSma,
    ema_fast: RollingEma,
    ema_slow: RollingEma,
    macd_signal: RollingEma,
    rsi: RollingRsi,
    bb_std: RollingStd,
    volatility: RollingStd,
    rows_seen: usize,
    prev_close: Option<f64>,
}

impl IndicatorPipeline {
    fn new() -> Self {
        Self {
            sma_5: RollingSma::new(5),
            sma_10: RollingSma::new(10),
            sma_20: RollingSma::new(BOLLINGER_WINDOW),
            sma_50: RollingSma::new(50),
            ema_fast: RollingEma::new(MACD_FAST),
            ema_slow: RollingEma::new(MACD_SLOW),
            macd_signal: RollingEma::new(MACD_SIGNAL),
            rsi: RollingRsi::new(RSI_WINDOW),
            bb_std: RollingStd::new(BOLLINGER_WINDOW),
            volatility: RollingStd::new(VOLATILITY_WINDOW),
            rows_seen: 0,
            prev_close: None,
        }
    }

    fn update(&mut self, close: f64) -> Indicators {
        self.rows_seen += 1;

        let returns = match self.prev_close {
            Some(prev) if prev > 0.0 => Some(close / prev - 1.0),
            _ => None,
        };
        self.prev_close = Some(close);

        let sma_20 = self.sma_20.update(close);
        let bb_std = self.bb_std.update(close);
        let (bb_upper, bb_lower) = match (sma_20, bb_std) {
            (Some(mid), Some(std)) => (
                Some(mid + BOLLINGER_WIDTH * std),
                Some(mid - BOLLINGER_WIDTH * std),
            ),
            _ => (None, None),
        };

        let ema_fast = self.ema_fast.update(close);
        let ema_slow = self.ema_slow.update(close);
        let macd = ema_fast - ema_slow;
        let signal = self.macd_signal.update(macd);

        // EMAs are defined from the first row but only meaningful once the span is covered.
        let ema_12 = (self.rows_seen >= MACD_FAST).then_some(ema_fast);
        let ema_26 = (self.rows_seen >= MACD_SLOW).then_some(ema_slow);
        let macd_ready = self.rows_seen >= MACD_SLOW;

        Indicators {
            returns,
            sma_5: self.sma_5.update(close),
            sma_10: self.sma_10.update(close),
            sma_20,
            sma_50: self.sma_50.update(close),
            ema_12,
            ema_26,
            rsi_14: self.rsi.update(close),
            macd: macd_ready.then_some(macd),
            macd_signal: macd_ready.then_some(signal),
            macd_histogram: macd_ready.then_some(macd - signal),
            bb_upper,
            bb_middle: sma_20,
            bb_lower,
            volatility_20: returns.and_then(|r| self.volatility.update(r)),
        }
    }
}

pub fn compute_indicators(bars: &[Bar]) -> Vec<Indicators> {
    let mut pipeline = IndicatorPipeline::new();
    bars.iter().map(|bar| pipeline.update(bar.close)).collect()
}

/// Price history for one symbol with indicators attached row by row.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFrame {
    pub symbol: String,
    pub interval: Interval,
    pub bars: Vec<Bar>,
    pub indicators: Vec<Indicators>,
}

impl MarketFrame {
    pub fn new(symbol: impl Into<String>, interval: Interval, bars: Vec<Bar>) -> Self {
        let indicators = compute_indicators(&bars);
        Self {
            symbol: symbol.into(),
            interval,
            bars,
            indicators,
        }
    }

    pub fn empty(symbol: impl Into<String>, interval: Interval) -> Self {
        Self::new(symbol, interval, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Frame holding only the first `len` rows. Indicators are causal, so the
    /// prefix is identical to recomputing on the truncated bars.
    pub fn truncated(&self, len: usize) -> Self {
        let len = len.min(self.bars.len());
        Self {
            symbol: self.symbol.clone(),
            interval: self.interval,
            bars: self.bars[..len].to_vec(),
            indicators: self.indicators[..len].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{compute_indicators, MarketFrame};
    use crate::value_objects::bar::Bar;
    use crate::value_objects::interval::Interval;

    fn bars(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(idx, close)| Bar {
                symbol: "AAPL".to_string(),
                timestamp: idx as i64 * 86_400,
                open: *close,
                high: *close,
                low: *close,
                close: *close,
                volume: 1_000.0,
            })
            .collect()
    }

    #[test]
    fn warm_up_rows_are_none() {
        let closes: Vec<f64> = (1..=30).map(|v| v as f64).collect();
        let indicators = compute_indicators(&bars(&closes));
        assert!(indicators[0].returns.is_none());
        assert!(indicators[3].sma_5.is_none());
        assert!((indicators[4].sma_5.unwrap() - 3.0).abs() < 1e-12);
        assert!(indicators[18].bb_upper.is_none());
        assert!(indicators[19].bb_upper.unwrap() > indicators[19].bb_lower.unwrap());
        assert!(indicators[24].macd.is_none());
        assert!(indicators[25].macd.unwrap() > 0.0);
        assert!(indicators[29].sma_50.is_none());
    }

    #[test]
    fn indicators_are_causal() {
        let closes: Vec<f64> = (0..60).map(|v| 100.0 + (v as f64 * 0.7).sin() * 5.0).collect();
        let full = compute_indicators(&bars(&closes));
        let prefix = compute_indicators(&bars(&closes[..40]));
        assert_eq!(&full[..40], prefix.as_slice());
    }

    #[test]
    fn truncated_frame_keeps_rows_aligned() {
        let closes: Vec<f64> = (1..=10).map(|v| v as f64).collect();
        let frame = MarketFrame::new("AAPL", Interval::OneDay, bars(&closes));
        let head = frame.truncated(4);
        assert_eq!(head.len(), 4);
        assert_eq!(head.indicators.len(), 4);
        assert_eq!(frame.truncated(100).len(), 10);
    }
}
