use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Prediction {
    Buy,
    Sell,
    Hold,
}

impl Prediction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Prediction::Buy => "BUY",
            Prediction::Sell => "SELL",
            Prediction::Hold => "HOLD",
        }
    }

    /// +1 for BUY, -1 for SELL, 0 for HOLD.
    pub fn direction(&self) -> f64 {
        match self {
            Prediction::Buy => 1.0,
            Prediction::Sell => -1.0,
            Prediction::Hold => 0.0,
        }
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Prediction {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "BUY" => Ok(Prediction::Buy),
            "SELL" => Ok(Prediction::Sell),
            "HOLD" => Ok(Prediction::Hold),
            _ => Err(format!("invalid prediction: {value}")),
        }
    }
}
