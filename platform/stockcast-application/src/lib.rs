pub mod backtesting;
pub mod config;
pub mod error;
pub mod loader;
pub mod optimization;
pub mod reporting;

pub use error::AppError;
