use crate::value_objects::position::Position;
use crate::value_objects::trade::{ClosedTrade, TradeReason};
use std::collections::BTreeMap;

/// Cash plus at most one open long position per symbol.
#[derive(Debug, Default, Clone)]
pub struct Portfolio {
    positions: BTreeMap<String, Position>,
    cash: f64,
    realized_pnl: f64,
}

impl Portfolio {
    pub fn new_with_cash(initial_cash: f64) -> Self {
        Self {
            positions: BTreeMap::new(),
            cash: initial_cash,
            realized_pnl: 0.0,
        }
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values()
    }

    pub fn is_flat(&self, symbol: &str) -> bool {
        !self.positions.contains_key(symbol)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &mut self,
        symbol: &str,
        quantity: f64,
        price: f64,
        commission: f64,
        timestamp: i64,
        stop_loss_price: Option<f64>,
        take_profit_price: Option<f64>,
    ) -> bool {
        if quantity <= 0.0 || !self.is_flat(symbol) {
            return false;
        }
        let cost = quantity * price + commission;
        if cost > self.cash + 1e-9 {
            return false;
        }
        self.cash -= cost;
        if self.cash < 0.0 && self.cash > -1e-9 {
            self.cash = 0.0;
        }
        self.positions.insert(
            symbol.to_string(),
            Position {
                symbol: symbol.to_string(),
                quantity,
                entry_price: price,
                entry_timestamp: timestamp,
                entry_commission: commission,
                stop_loss_price,
                take_profit_price,
            },
        );
        true
    }

    pub fn close(
        &mut self,
        symbol: &str,
        price: f64,
        commission: f64,
        timestamp: i64,
        reason: TradeReason,
    ) -> Option<ClosedTrade> {
        let position = self.positions.remove(symbol)?;
        let proceeds = position.quantity * price - commission;
        self.cash += proceeds;

        let pnl = (price - position.entry_price) * position.quantity
            - position.entry_commission
            - commission;
        self.realized_pnl += pnl;

        let cost_basis = position.entry_price * position.quantity + position.entry_commission;
        let return_pct = if cost_basis > 0.0 {
            pnl / cost_basis * 100.0
        } else {
            0.0
        };

        Some(ClosedTrade {
            symbol: position.symbol,
            entry_timestamp: position.entry_timestamp,
            exit_timestamp: timestamp,
            quantity: position.quantity,
            entry_price: position.entry_price,
            exit_price: price,
            pnl,
            return_pct,
            exit_reason: reason,
        })
    }

    /// Marks open positions at `marks`, falling back to entry price for
    /// symbols without a mark.
    pub fn position_value(&self, marks: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.market_value(marks.get(&pos.symbol).copied().unwrap_or(pos.entry_price)))
            .sum()
    }

    pub fn unrealized_pnl(&self, marks: &BTreeMap<String, f64>) -> f64 {
        self.positions
            .values()
            .map(|pos| pos.unrealized_pnl(marks.get(&pos.symbol).copied().unwrap_or(pos.entry_price)))
            .sum()
    }

    pub fn equity(&self, marks: &BTreeMap<String, f64>) -> f64 {
        self.cash + self.position_value(marks)
    }
}
