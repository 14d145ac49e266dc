use crate::entities::metrics::{MetricsConfig, MetricsState, PerformanceMetrics};
use crate::entities::portfolio::Portfolio;
use crate::entities::risk::RiskControls;
use crate::error::DomainError;
use crate::value_objects::bar::Bar;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::prediction::Prediction;
use crate::value_objects::side::Side;
use crate::value_objects::signal::Signal;
use crate::value_objects::trade::{ClosedTrade, Trade, TradeReason};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    /// Fraction of notional charged per fill.
    pub commission_rate: f64,
    /// Adverse price move applied to every fill, as a fraction of price.
    pub slippage_rate: f64,
    pub max_position_size: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    pub min_confidence: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            commission_rate: 0.001,
            slippage_rate: 0.0005,
            max_position_size: 0.1,
            stop_loss_pct: None,
            take_profit_pct: None,
            min_confidence: 0.6,
        }
    }
}

impl SimulatorConfig {
    pub fn risk_controls(&self) -> RiskControls {
        RiskControls {
            max_position_size: self.max_position_size,
            stop_loss_pct: self.stop_loss_pct,
            take_profit_pct: self.take_profit_pct,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(DomainError::invalid(
                "initial_capital",
                format!("must be > 0, got {}", self.initial_capital),
            ));
        }
        for (name, value) in [
            ("commission_rate", self.commission_rate),
            ("slippage_rate", self.slippage_rate),
        ] {
            if !value.is_finite() || !(0.0..1.0).contains(&value) {
                return Err(DomainError::invalid(name, format!("must be in [0, 1), got {value}")));
            }
        }
        if !self.min_confidence.is_finite() || !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(DomainError::invalid(
                "min_confidence",
                format!("must be in [0, 1], got {}", self.min_confidence),
            ));
        }
        self.risk_controls().validate()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    BelowConfidence,
    InsufficientFunds,
    AlreadyInPosition,
    NoPosition,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::BelowConfidence => "below_confidence",
            SkipReason::InsufficientFunds => "insufficient_funds",
            SkipReason::AlreadyInPosition => "already_in_position",
            SkipReason::NoPosition => "no_position",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Filled(Trade),
    Skipped(SkipReason),
    NoAction,
}

impl ExecutionResult {
    pub fn is_filled(&self) -> bool {
        matches!(self, ExecutionResult::Filled(_))
    }
}

/// Long-only ledger driven by signals and price ticks.
#[derive(Debug, Clone)]
pub struct TradingSimulator {
    config: SimulatorConfig,
    risk: RiskControls,
    portfolio: Portfolio,
    metrics: MetricsState,
    marks: BTreeMap<String, f64>,
    first_marks: BTreeMap<String, f64>,
    skipped: BTreeMap<SkipReason, usize>,
}

impl TradingSimulator {
    pub fn new(config: SimulatorConfig, metrics_config: MetricsConfig) -> Result<Self, DomainError> {
        config.validate()?;
        Ok(Self {
            config,
            risk: config.risk_controls(),
            portfolio: Portfolio::new_with_cash(config.initial_capital),
            metrics: MetricsState::new(metrics_config, config.initial_capital),
            marks: BTreeMap::new(),
            first_marks: BTreeMap::new(),
            skipped: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn cash(&self) -> f64 {
        self.portfolio.cash()
    }

    pub fn equity(&self) -> f64 {
        self.portfolio.equity(&self.marks)
    }

    pub fn trades(&self) -> &[Trade] {
        self.metrics.trades()
    }

    pub fn closed_trades(&self) -> &[ClosedTrade] {
        self.metrics.closed_trades()
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        self.metrics.equity_curve()
    }

    pub fn skipped(&self) -> &BTreeMap<SkipReason, usize> {
        &self.skipped
    }

    /// Marks `symbol` at `price`, applies stop-loss / take-profit exits and
    /// records an equity point.
    pub fn on_tick(&mut self, symbol: &str, timestamp: i64, price: f64) {
        self.mark(symbol, price);
        self.check_exits(symbol, timestamp, price);
        self.record_equity(timestamp);
    }

    pub fn execute_signal(&mut self, signal: &Signal) -> ExecutionResult {
        let price = signal.current_price;
        if !price.is_finite() || price <= 0.0 {
            return ExecutionResult::NoAction;
        }
        self.mark(&signal.symbol, price);
        self.check_exits(&signal.symbol, signal.timestamp, price);

        if signal.confidence < self.config.min_confidence {
            return self.skip(SkipReason::BelowConfidence);
        }

        match signal.prediction {
            Prediction::Hold => ExecutionResult::NoAction,
            Prediction::Buy => {
                if !self.portfolio.is_flat(&signal.symbol) {
                    return self.skip(SkipReason::AlreadyInPosition);
                }
                self.buy(&signal.symbol, signal.timestamp, price)
            }
            Prediction::Sell => {
                if self.portfolio.is_flat(&signal.symbol) {
                    return self.skip(SkipReason::NoPosition);
                }
                match self.sell(&signal.symbol, signal.timestamp, price, TradeReason::Signal) {
                    Some(trade) => ExecutionResult::Filled(trade),
                    None => self.skip(SkipReason::NoPosition),
                }
            }
        }
    }

    /// Replays `bars` within `[start, end]`, executing the signal stamped at
    /// each bar before the bar's tick is recorded.
    pub fn run(
        &mut self,
        bars: &[Bar],
        signals: &[Signal],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PerformanceMetrics, DomainError> {
        if start > end {
            return Err(DomainError::InvalidRange { start, end });
        }
        let by_bar: HashMap<(i64, &str), &Signal> = signals
            .iter()
            .map(|signal| ((signal.timestamp, signal.symbol.as_str()), signal))
            .collect();

        for bar in bars {
            let day = bar.date();
            if day < start || day > end {
                continue;
            }
            if let Some(signal) = by_bar.get(&(bar.timestamp, bar.symbol.as_str())) {
                self.execute_signal(signal);
            }
            self.on_tick(&bar.symbol, bar.timestamp, bar.close);
        }

        Ok(self.calculate_performance_metrics())
    }

    /// Open positions are marked at the last seen price, not liquidated.
    pub fn calculate_performance_metrics(&self) -> PerformanceMetrics {
        self.metrics.summary(
            self.config.initial_capital,
            self.equity(),
            self.buy_and_hold_return_pct(),
        )
    }

    fn buy(&mut self, symbol: &str, timestamp: i64, price: f64) -> ExecutionResult {
        let equity = self.equity();
        let budget = self.risk.position_budget(equity, self.portfolio.cash());
        let fill_price = price * (1.0 + self.config.slippage_rate);
        let unit_cost = fill_price * (1.0 + self.config.commission_rate);
        let quantity = (budget / unit_cost).floor();
        if !quantity.is_finite() || quantity < 1.0 {
            return self.skip(SkipReason::InsufficientFunds);
        }
        // Sizing from the budget keeps the notional within the cap.
        debug_assert!(self.risk.allows_notional(equity, quantity * fill_price));

        let commission = quantity * fill_price * self.config.commission_rate;
        let opened = self.portfolio.open(
            symbol,
            quantity,
            fill_price,
            commission,
            timestamp,
            self.risk.stop_loss_price(fill_price),
            self.risk.take_profit_price(fill_price),
        );
        if !opened {
            return self.skip(SkipReason::InsufficientFunds);
        }

        let trade = Trade {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Buy,
            quantity,
            price: fill_price,
            commission,
            slippage: quantity * (fill_price - price),
            reason: TradeReason::Signal,
        };
        self.metrics.record_trade(trade.clone());
        ExecutionResult::Filled(trade)
    }

    fn sell(&mut self, symbol: &str, timestamp: i64, price: f64, reason: TradeReason) -> Option<Trade> {
        let quantity = self.portfolio.position(symbol)?.quantity;
        let fill_price = price * (1.0 - self.config.slippage_rate);
        let commission = quantity * fill_price * self.config.commission_rate;
        let closed = self
            .portfolio
            .close(symbol, fill_price, commission, timestamp, reason)?;

        let trade = Trade {
            timestamp,
            symbol: symbol.to_string(),
            side: Side::Sell,
            quantity,
            price: fill_price,
            commission,
            slippage: quantity * (price - fill_price),
            reason,
        };
        self.metrics.record_trade(trade.clone());
        self.metrics.record_closed_trade(closed);
        Some(trade)
    }

    fn check_exits(&mut self, symbol: &str, timestamp: i64, price: f64) {
        let reason = match self.portfolio.position(symbol) {
            Some(pos) if pos.stop_loss_hit(price) => TradeReason::StopLoss,
            Some(pos) if pos.take_profit_hit(price) => TradeReason::TakeProfit,
            _ => return,
        };
        self.sell(symbol, timestamp, price, reason);
    }

    fn mark(&mut self, symbol: &str, price: f64) {
        self.marks.insert(symbol.to_string(), price);
        self.first_marks.entry(symbol.to_string()).or_insert(price);
    }

    fn record_equity(&mut self, timestamp: i64) {
        let point = EquityPoint {
            timestamp,
            equity: self.portfolio.equity(&self.marks),
            cash: self.portfolio.cash(),
            position_value: self.portfolio.position_value(&self.marks),
            unrealized_pnl: self.portfolio.unrealized_pnl(&self.marks),
            realized_pnl: self.portfolio.realized_pnl(),
        };
        self.metrics.record_equity(point);
    }

    fn skip(&mut self, reason: SkipReason) -> ExecutionResult {
        *self.skipped.entry(reason).or_insert(0) += 1;
        ExecutionResult::Skipped(reason)
    }

    /// Defined for single-symbol runs only.
    fn buy_and_hold_return_pct(&self) -> Option<f64> {
        if self.first_marks.len() != 1 {
            return None;
        }
        let (symbol, first) = self.first_marks.iter().next()?;
        let last = self.marks.get(symbol)?;
        if *first <= 0.0 {
            return None;
        }
        Some((last / first - 1.0) * 100.0)
    }
}
