pub mod bar;
pub mod equity_point;
pub mod interval;
pub mod parameters;
pub mod position;
pub mod prediction;
pub mod side;
pub mod signal;
pub mod trade;
