use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::side::Side;
use crate::value_objects::trade::{ClosedTrade, Trade};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsConfig {
    /// Annual risk-free rate, spread evenly over `annualization_factor` periods.
    pub risk_free_rate: f64,
    /// Periods per year; `None` scales Sharpe by the number of observed returns.
    pub annualization_factor: Option<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            annualization_factor: Some(252.0),
        }
    }
}

/// End-of-run snapshot. Percent fields are expressed in percent (5.0 == 5 %).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub bars_processed: usize,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate: f64,
    /// Gross profit over gross loss; `None` when no losing round trip exists.
    pub profit_factor: Option<f64>,
    pub total_trades: usize,
    pub round_trips: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub total_commission: f64,
    pub total_slippage: f64,
    pub buy_and_hold_return_pct: Option<f64>,
}

#[derive(Debug, Default, Clone)]
pub struct MetricsState {
    equity_curve: Vec<EquityPoint>,
    trades: Vec<Trade>,
    closed_trades: Vec<ClosedTrade>,
    peak_equity: f64,
    max_drawdown: f64,
    config: MetricsConfig,
}

impl MetricsState {
    /// The drawdown peak starts at `initial_capital`, so costs paid on the
    /// first tick count as drawdown.
    pub fn new(config: MetricsConfig, initial_capital: f64) -> Self {
        Self {
            equity_curve: Vec::new(),
            trades: Vec::new(),
            closed_trades: Vec::new(),
            peak_equity: initial_capital.max(0.0),
            max_drawdown: 0.0,
            config,
        }
    }

    pub fn record_equity(&mut self, point: EquityPoint) {
        if point.equity > self.peak_equity {
            self.peak_equity = point.equity;
        } else if self.peak_equity > 0.0 {
            let drawdown = (self.peak_equity - point.equity) / self.peak_equity;
            if drawdown > self.max_drawdown {
                self.max_drawdown = drawdown;
            }
        }
        self.equity_curve.push(point);
    }

    pub fn record_trade(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn record_closed_trade(&mut self, closed: ClosedTrade) {
        self.closed_trades.push(closed);
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    /// Drawdown as a fraction of the running peak.
    pub fn max_drawdown(&self) -> f64 {
        self.max_drawdown
    }

    pub fn summary(
        &self,
        initial_capital: f64,
        final_equity: f64,
        buy_and_hold_return_pct: Option<f64>,
    ) -> PerformanceMetrics {
        let total_return_pct = if initial_capital > 0.0 {
            (final_equity / initial_capital - 1.0) * 100.0
        } else {
            0.0
        };

        let winners: Vec<&ClosedTrade> =
            self.closed_trades.iter().filter(|t| t.pnl > 0.0).collect();
        let losers: Vec<&ClosedTrade> =
            self.closed_trades.iter().filter(|t| t.pnl <= 0.0).collect();
        let gross_profit: f64 = winners.iter().map(|t| t.pnl).sum();
        let gross_loss: f64 = losers.iter().map(|t| -t.pnl).sum();

        let round_trips = self.closed_trades.len();
        let win_rate = if round_trips == 0 {
            0.0
        } else {
            winners.len() as f64 / round_trips as f64
        };
        let profit_factor = if gross_loss > 0.0 {
            Some(gross_profit / gross_loss)
        } else {
            None
        };

        PerformanceMetrics {
            bars_processed: self.equity_curve.len(),
            initial_capital,
            final_equity,
            total_return_pct,
            annualized_return_pct: self.annualized_return_pct(initial_capital, final_equity),
            sharpe_ratio: self.sharpe_ratio(),
            max_drawdown_pct: self.max_drawdown * 100.0,
            win_rate,
            profit_factor,
            total_trades: self.trades.len(),
            round_trips,
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            avg_win: mean(winners.iter().map(|t| t.pnl)),
            avg_loss: mean(losers.iter().map(|t| t.pnl)),
            total_commission: self.trades.iter().map(|t| t.commission).sum(),
            total_slippage: self.trades.iter().map(|t| t.slippage).sum(),
            buy_and_hold_return_pct,
        }
    }

    fn annualized_return_pct(&self, initial_capital: f64, final_equity: f64) -> f64 {
        let periods = self.equity_curve.len().saturating_sub(1);
        if periods == 0 || initial_capital <= 0.0 || final_equity <= 0.0 {
            return 0.0;
        }
        let per_year = self.config.annualization_factor.unwrap_or(periods as f64);
        let growth = final_equity / initial_capital;
        (growth.powf(per_year / periods as f64) - 1.0) * 100.0
    }

    fn sharpe_ratio(&self) -> f64 {
        if self.equity_curve.len() < 2 {
            return 0.0;
        }

        let per_period_rf = match self.config.annualization_factor {
            Some(factor) if factor > 0.0 => self.config.risk_free_rate / factor,
            _ => 0.0,
        };

        let mut returns = Vec::with_capacity(self.equity_curve.len() - 1);
        for pair in self.equity_curve.windows(2) {
            let prev = pair[0].equity;
            let curr = pair[1].equity;
            if prev > 0.0 {
                returns.push(curr / prev - 1.0 - per_period_rf);
            }
        }

        if returns.len() < 2 {
            return 0.0;
        }

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let var = returns
            .iter()
            .map(|ret| {
                let diff = ret - mean;
                diff * diff
            })
            .sum::<f64>()
            / (returns.len() as f64 - 1.0);

        let std = var.sqrt();
        if std == 0.0 || !std.is_finite() {
            0.0
        } else {
            let scale = self
                .config
                .annualization_factor
                .unwrap_or(returns.len() as f64);
            mean / std * scale.sqrt()
        }
    }
}

/// Count of fills per side, for reports.
pub fn fills_by_side(trades: &[Trade]) -> (usize, usize) {
    trades.iter().fold((0, 0), |(buys, sells), trade| match trade.side {
        Side::Buy => (buys + 1, sells),
        Side::Sell => (buys, sells + 1),
    })
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{MetricsConfig, MetricsState};
    use crate::value_objects::equity_point::EquityPoint;
    use crate::value_objects::trade::{ClosedTrade, TradeReason};

    fn point(ts: i64, equity: f64) -> EquityPoint {
        EquityPoint {
            timestamp: ts,
            equity,
            cash: equity,
            position_value: 0.0,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
        }
    }

    fn closed(pnl: f64) -> ClosedTrade {
        ClosedTrade {
            symbol: "AAPL".to_string(),
            entry_timestamp: 1,
            exit_timestamp: 2,
            quantity: 1.0,
            entry_price: 100.0,
            exit_price: 100.0 + pnl,
            pnl,
            return_pct: pnl,
            exit_reason: TradeReason::Signal,
        }
    }

    #[test]
    fn computes_return_and_drawdown() {
        let mut metrics = MetricsState::new(MetricsConfig::default(), 100.0);
        metrics.record_equity(point(1, 100.0));
        metrics.record_equity(point(2, 80.0));
        metrics.record_equity(point(3, 120.0));

        let summary = metrics.summary(100.0, 120.0, None);
        assert!((summary.total_return_pct - 20.0).abs() < 1e-9);
        assert!((summary.max_drawdown_pct - 20.0).abs() < 1e-9);
        assert_eq!(summary.bars_processed, 3);
    }

    #[test]
    fn first_tick_loss_counts_as_drawdown() {
        let mut metrics = MetricsState::new(MetricsConfig::default(), 100.0);
        metrics.record_equity(point(1, 95.0));
        metrics.record_equity(point(2, 97.0));

        let summary = metrics.summary(100.0, 97.0, None);
        assert!((summary.max_drawdown_pct - 5.0).abs() < 1e-9);
    }

    #[test]
    fn win_rate_and_profit_factor_use_round_trips() {
        let mut metrics = MetricsState::new(MetricsConfig::default(), 100.0);
        metrics.record_closed_trade(closed(30.0));
        metrics.record_closed_trade(closed(-10.0));
        metrics.record_closed_trade(closed(10.0));

        let summary = metrics.summary(100.0, 130.0, None);
        assert_eq!(summary.round_trips, 3);
        assert_eq!(summary.winning_trades, 2);
        assert!((summary.win_rate - 2.0 / 3.0).abs() < 1e-9);
        assert!((summary.profit_factor.unwrap() - 4.0).abs() < 1e-9);
        assert!((summary.avg_win - 20.0).abs() < 1e-9);
        assert!((summary.avg_loss + 10.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_is_undefined_without_losses() {
        let mut metrics = MetricsState::new(MetricsConfig::default(), 100.0);
        metrics.record_closed_trade(closed(5.0));
        assert!(metrics.summary(100.0, 105.0, None).profit_factor.is_none());
    }

    #[test]
    fn flat_equity_has_zero_sharpe() {
        let mut metrics = MetricsState::new(MetricsConfig::default(), 100.0);
        for ts in 0..10 {
            metrics.record_equity(point(ts, 100.0));
        }
        assert_eq!(metrics.summary(100.0, 100.0, None).sharpe_ratio, 0.0);
    }
}
