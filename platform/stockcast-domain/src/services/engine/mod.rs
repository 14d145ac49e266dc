pub mod simulator;
pub mod walk_forward;

pub use simulator::{ExecutionResult, SimulatorConfig, SkipReason, TradingSimulator};
pub use walk_forward::BacktestPredictionEngine;
