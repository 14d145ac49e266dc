use crate::error::DomainError;
use crate::services::features::MarketFrame;
use crate::services::models::{History, ModelPrediction, SignalModel};
use crate::value_objects::interval::Frequency;
use crate::value_objects::signal::Signal;
use chrono::NaiveDate;

/// Replays a model over a frame at a fixed cadence. At each step the model
/// only sees rows strictly before the step row.
#[derive(Debug, Clone)]
pub struct BacktestPredictionEngine<M: SignalModel> {
    model: M,
}

impl<M: SignalModel> BacktestPredictionEngine<M> {
    pub fn new(model: M) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn walk_forward_backtest(
        &mut self,
        frame: &MarketFrame,
        start: NaiveDate,
        end: NaiveDate,
        frequency: Frequency,
        lookback_days: usize,
    ) -> Result<Vec<Signal>, DomainError> {
        if lookback_days == 0 {
            return Err(DomainError::invalid("lookback_days", "must be >= 1"));
        }
        if start > end {
            return Err(DomainError::InvalidRange { start, end });
        }

        let mut signals = Vec::new();
        let mut cursor = frame.bars.iter().position(|bar| bar.date() >= start);

        while let Some(step) = cursor {
            let bar = &frame.bars[step];
            let step_date = bar.date();
            if step_date > end {
                break;
            }

            let ModelPrediction {
                prediction,
                confidence,
            } = if step < lookback_days {
                ModelPrediction::hold(0.0)
            } else {
                let from = step - lookback_days;
                let history = History::new(&frame.bars[from..step], &frame.indicators[from..step]);
                self.model.predict(&history)
            };

            signals.push(Signal::new(
                bar.timestamp,
                frame.symbol.clone(),
                prediction,
                confidence,
                bar.close,
            ));

            cursor = next_step(frame, step, step_date, frequency);
        }

        Ok(signals)
    }
}

fn next_step(
    frame: &MarketFrame,
    step: usize,
    step_date: NaiveDate,
    frequency: Frequency,
) -> Option<usize> {
    let candidate = step + 1;
    if candidate >= frame.len() {
        return None;
    }
    match frequency.next_min_date(step_date) {
        None => Some(candidate),
        Some(min_date) => frame.bars[candidate..]
            .iter()
            .position(|bar| bar.date() >= min_date)
            .map(|offset| candidate + offset),
    }
}

#[cfg(test)]
mod tests {
    use super::BacktestPredictionEngine;
    use crate::services::features::MarketFrame;
    use crate::services::models::{History, ModelPrediction, SignalModel, TrendModel};
    use crate::value_objects::bar::{timestamp_from_date, Bar};
    use crate::value_objects::interval::{Frequency, Interval};
    use crate::value_objects::prediction::Prediction;
    use chrono::{Datelike, NaiveDate, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn business_frame(from: NaiveDate, to: NaiveDate) -> MarketFrame {
        let mut bars = Vec::new();
        let mut day = from;
        let mut idx = 0.0;
        while day <= to {
            if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
                let close = 100.0 + idx;
                bars.push(Bar {
                    symbol: "AAPL".to_string(),
                    timestamp: timestamp_from_date(day),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: 1_000.0,
                });
                idx += 1.0;
            }
            day = day.succ_opt().unwrap();
        }
        MarketFrame::new("AAPL", Interval::OneDay, bars)
    }

    /// Records the newest timestamp it was shown.
    #[derive(Default)]
    struct Recorder {
        seen: Vec<Option<i64>>,
    }

    impl SignalModel for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn predict(&mut self, history: &History<'_>) -> ModelPrediction {
            self.seen.push(history.last_bar().map(|b| b.timestamp));
            ModelPrediction::new(Prediction::Buy, 0.9)
        }
    }

    #[test]
    fn daily_steps_never_see_the_step_row() {
        let frame = business_frame(date(2023, 9, 1), date(2023, 12, 1));
        let mut engine = BacktestPredictionEngine::new(Recorder::default());
        let signals = engine
            .walk_forward_backtest(&frame, date(2023, 11, 1), date(2023, 12, 1), Frequency::Daily, 10)
            .unwrap();

        assert_eq!(signals.len(), 23);
        let seen = &engine.model().seen;
        assert_eq!(seen.len(), signals.len());
        for (signal, last_seen) in signals.iter().zip(seen) {
            assert!(last_seen.unwrap() < signal.timestamp);
        }
        assert!(signals.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn current_price_is_step_close() {
        let frame = business_frame(date(2023, 10, 1), date(2023, 11, 10));
        let mut engine = BacktestPredictionEngine::new(TrendModel);
        let signals = engine
            .walk_forward_backtest(&frame, date(2023, 11, 1), date(2023, 11, 10), Frequency::Daily, 5)
            .unwrap();
        for signal in &signals {
            let bar = frame.bars.iter().find(|b| b.timestamp == signal.timestamp).unwrap();
            assert_eq!(signal.current_price, bar.close);
        }
    }

    #[test]
    fn short_history_emits_zero_confidence_hold() {
        let frame = business_frame(date(2023, 11, 1), date(2023, 11, 30));
        let mut engine = BacktestPredictionEngine::new(Recorder::default());
        let signals = engine
            .walk_forward_backtest(&frame, date(2023, 11, 1), date(2023, 11, 30), Frequency::Daily, 10)
            .unwrap();
        assert_eq!(signals[0].prediction, Prediction::Hold);
        assert_eq!(signals[0].confidence, 0.0);
        assert_eq!(signals[9].prediction, Prediction::Hold);
        assert_eq!(signals[10].prediction, Prediction::Buy);
        assert_eq!(engine.model().seen.len(), signals.len() - 10);
    }

    #[test]
    fn weekly_and_monthly_cadence() {
        let frame = business_frame(date(2023, 1, 2), date(2023, 12, 29));
        let mut engine = BacktestPredictionEngine::new(TrendModel);

        let weekly = engine
            .walk_forward_backtest(&frame, date(2023, 11, 1), date(2023, 12, 1), Frequency::Weekly, 10)
            .unwrap();
        let dates: Vec<NaiveDate> = weekly
            .iter()
            .map(|s| crate::value_objects::bar::date_from_timestamp(s.timestamp))
            .collect();
        assert_eq!(
            dates,
            vec![date(2023, 11, 1), date(2023, 11, 8), date(2023, 11, 15), date(2023, 11, 22), date(2023, 11, 29)]
        );

        let monthly = engine
            .walk_forward_backtest(&frame, date(2023, 6, 1), date(2023, 12, 31), Frequency::Monthly, 10)
            .unwrap();
        assert_eq!(monthly.len(), 7);
    }

    #[test]
    fn rejects_zero_lookback_and_inverted_range() {
        let frame = business_frame(date(2023, 11, 1), date(2023, 11, 30));
        let mut engine = BacktestPredictionEngine::new(TrendModel);
        assert!(engine
            .walk_forward_backtest(&frame, date(2023, 11, 1), date(2023, 11, 30), Frequency::Daily, 0)
            .is_err());
        assert!(engine
            .walk_forward_backtest(&frame, date(2023, 11, 30), date(2023, 11, 1), Frequency::Daily, 5)
            .is_err());
    }

    #[test]
    fn empty_frame_yields_no_signals() {
        let frame = MarketFrame::empty("AAPL", Interval::OneDay);
        let mut engine = BacktestPredictionEngine::new(TrendModel);
        let signals = engine
            .walk_forward_backtest(&frame, date(2023, 11, 1), date(2023, 11, 30), Frequency::Daily, 5)
            .unwrap();
        assert!(signals.is_empty());
    }
}
