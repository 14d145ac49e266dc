use serde::{Deserialize, Serialize};
use std::fmt;

/// One point of the optimizer search space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    pub confidence_threshold: f64,
    pub lookback_days: usize,
    pub max_position_size: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pct = |value: Option<f64>| value.map_or_else(|| "none".to_string(), |v| v.to_string());
        write!(
            f,
            "conf={} lookback={} size={} sl={} tp={}",
            self.confidence_threshold,
            self.lookback_days,
            self.max_position_size,
            pct(self.stop_loss_pct),
            pct(self.take_profit_pct)
        )
    }
}

/// Flat leaderboard line, one per evaluated parameter set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardRow {
    pub rank: usize,
    pub confidence_threshold: f64,
    pub lookback_days: usize,
    pub max_position_size: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub score: f64,
    pub total_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    pub profit_factor: Option<f64>,
    pub total_trades: usize,
}

#[cfg(test)]
mod tests {
    use super::ParameterSet;

    #[test]
    fn display_marks_missing_exits() {
        let params = ParameterSet {
            confidence_threshold: 0.6,
            lookback_days: 10,
            max_position_size: 0.2,
            stop_loss_pct: Some(0.05),
            take_profit_pct: None,
        };
        assert_eq!(params.to_string(), "conf=0.6 lookback=10 size=0.2 sl=0.05 tp=none");
    }
}
