pub mod csv_dir;
pub mod yahoo;

pub use csv_dir::CsvDirectoryProvider;
pub use yahoo::{YahooChartProvider, YahooConfig};
