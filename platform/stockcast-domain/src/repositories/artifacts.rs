use super::RepositoryError;
use crate::entities::metrics::PerformanceMetrics;
use crate::value_objects::equity_point::EquityPoint;
use crate::value_objects::parameters::LeaderboardRow;
use crate::value_objects::signal::Signal;
use crate::value_objects::trade::Trade;
use std::path::Path;

pub trait ArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), RepositoryError>;
    fn write_signals_csv(&self, path: &Path, signals: &[Signal]) -> Result<(), RepositoryError>;
    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), RepositoryError>;
    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), RepositoryError>;
    fn write_summary_json(
        &self,
        path: &Path,
        summary: &PerformanceMetrics,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), RepositoryError>;
    fn write_leaderboard_csv(&self, path: &Path, rows: &[LeaderboardRow]) -> Result<(), RepositoryError>;
    fn write_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), RepositoryError>;
}

pub trait ArtifactReader {
    fn read_summary_json(&self, path: &Path) -> Result<PerformanceMetrics, RepositoryError>;
    fn read_trades_csv(&self, path: &Path) -> Result<Vec<Trade>, RepositoryError>;
    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, RepositoryError>;
    fn exists(&self, path: &Path) -> bool;
}
