use crate::error::DomainError;

/// Position sizing and exit rules applied by the trading simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskControls {
    /// Largest position notional as a fraction of equity, in (0, 1].
    pub max_position_size: f64,
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
}

impl Default for RiskControls {
    fn default() -> Self {
        Self {
            max_position_size: 0.1,
            stop_loss_pct: None,
            take_profit_pct: None,
        }
    }
}

impl RiskControls {
    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.max_position_size.is_finite()
            || self.max_position_size <= 0.0
            || self.max_position_size > 1.0
        {
            return Err(DomainError::invalid(
                "max_position_size",
                format!("must be in (0, 1], got {}", self.max_position_size),
            ));
        }
        if let Some(pct) = self.stop_loss_pct {
            if !pct.is_finite() || pct <= 0.0 || pct >= 1.0 {
                return Err(DomainError::invalid(
                    "stop_loss_pct",
                    format!("must be in (0, 1), got {pct}"),
                ));
            }
        }
        if let Some(pct) = self.take_profit_pct {
            if !pct.is_finite() || pct <= 0.0 {
                return Err(DomainError::invalid(
                    "take_profit_pct",
                    format!("must be > 0, got {pct}"),
                ));
            }
        }
        Ok(())
    }

    /// Cash that may be committed to a new position.
    pub fn position_budget(&self, equity: f64, cash: f64) -> f64 {
        if equity <= 0.0 || cash <= 0.0 {
            return 0.0;
        }
        (self.max_position_size * equity).min(cash)
    }

    pub fn allows_notional(&self, equity: f64, notional: f64) -> bool {
        if equity <= 0.0 {
            return false;
        }
        notional <= self.max_position_size * equity + 1e-9
    }

    pub fn stop_loss_price(&self, entry_price: f64) -> Option<f64> {
        self.stop_loss_pct.map(|pct| entry_price * (1.0 - pct))
    }

    pub fn take_profit_price(&self, entry_price: f64) -> Option<f64> {
        self.take_profit_pct.map(|pct| entry_price * (1.0 + pct))
    }
}
