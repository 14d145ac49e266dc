pub mod calendar;
pub mod engine;
pub mod features;
pub mod models;
pub mod ohlcv;
pub mod split;
