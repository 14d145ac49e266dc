use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_timestamp: i64,
    /// Commission paid on entry, carried so round-trip PnL is net of both legs.
    pub entry_commission: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
}

impl Position {
    pub fn market_value(&self, price: f64) -> f64 {
        self.quantity * price
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.quantity
    }

    pub fn stop_loss_hit(&self, price: f64) -> bool {
        self.stop_loss_price.is_some_and(|stop| price <= stop)
    }

    pub fn take_profit_hit(&self, price: f64) -> bool {
        self.take_profit_price.is_some_and(|target| price >= target)
    }
}
