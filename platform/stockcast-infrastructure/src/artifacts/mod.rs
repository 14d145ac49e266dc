use serde::Deserialize;
use stockcast_domain::entities::metrics::PerformanceMetrics;
use stockcast_domain::repositories::artifacts::{ArtifactReader, ArtifactWriter};
use stockcast_domain::repositories::RepositoryError;
use stockcast_domain::value_objects::equity_point::EquityPoint;
use stockcast_domain::value_objects::parameters::LeaderboardRow;
use stockcast_domain::value_objects::side::Side;
use stockcast_domain::value_objects::signal::Signal;
use stockcast_domain::value_objects::trade::{Trade, TradeReason};
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactWriter;

impl FilesystemArtifactWriter {
    pub fn new() -> Self {
        Self
    }
}

fn io_err(action: &str, path: &Path, err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Storage(format!("failed to {action} {}: {err}", path.display()))
}

fn csv_writer(path: &Path) -> Result<csv::Writer<fs::File>, RepositoryError> {
    csv::Writer::from_path(path).map_err(|err| io_err("create", path, err))
}

impl ArtifactWriter for FilesystemArtifactWriter {
    fn ensure_dir(&self, path: &Path) -> Result<(), RepositoryError> {
        fs::create_dir_all(path).map_err(|err| io_err("create dir", path, err))
    }

    fn write_signals_csv(&self, path: &Path, signals: &[Signal]) -> Result<(), RepositoryError> {
        let mut wtr = csv_writer(path)?;
        wtr.write_record(["timestamp_utc", "symbol", "prediction", "confidence", "current_price"])
            .map_err(|err| io_err("write header", path, err))?;
        for signal in signals {
            wtr.write_record([
                signal.timestamp.to_string(),
                signal.symbol.clone(),
                signal.prediction.as_str().to_string(),
                signal.confidence.to_string(),
                signal.current_price.to_string(),
            ])
            .map_err(|err| io_err("write signal row", path, err))?;
        }
        wtr.flush().map_err(|err| io_err("flush", path, err))
    }

    fn write_trades_csv(&self, path: &Path, trades: &[Trade]) -> Result<(), RepositoryError> {
        let mut wtr = csv_writer(path)?;
        wtr.write_record([
            "timestamp_utc",
            "symbol",
            "side",
            "qty",
            "price",
            "commission",
            "slippage",
            "reason",
        ])
        .map_err(|err| io_err("write header", path, err))?;
        for trade in trades {
            wtr.write_record([
                trade.timestamp.to_string(),
                trade.symbol.clone(),
                trade.side.as_str().to_string(),
                trade.quantity.to_string(),
                trade.price.to_string(),
                trade.commission.to_string(),
                trade.slippage.to_string(),
                trade.reason.as_str().to_string(),
            ])
            .map_err(|err| io_err("write trade row", path, err))?;
        }
        wtr.flush().map_err(|err| io_err("flush", path, err))
    }

    fn write_equity_csv(&self, path: &Path, points: &[EquityPoint]) -> Result<(), RepositoryError> {
        let mut wtr = csv_writer(path)?;
        wtr.write_record([
            "timestamp_utc",
            "equity",
            "cash",
            "position_value",
            "unrealized_pnl",
            "realized_pnl",
        ])
        .map_err(|err| io_err("write header", path, err))?;
        for point in points {
            wtr.write_record([
                point.timestamp.to_string(),
                point.equity.to_string(),
                point.cash.to_string(),
                point.position_value.to_string(),
                point.unrealized_pnl.to_string(),
                point.realized_pnl.to_string(),
            ])
            .map_err(|err| io_err("write equity row", path, err))?;
        }
        wtr.flush().map_err(|err| io_err("flush", path, err))
    }

    fn write_summary_json(
        &self,
        path: &Path,
        summary: &PerformanceMetrics,
        meta: Option<&serde_json::Value>,
    ) -> Result<(), RepositoryError> {
        let value = serde_json::json!({
            "metrics": summary,
            "meta": meta,
        });
        self.write_json(path, &value)
    }

    fn write_leaderboard_csv(&self, path: &Path, rows: &[LeaderboardRow]) -> Result<(), RepositoryError> {
        let mut wtr = csv_writer(path)?;
        for row in rows {
            wtr.serialize(row)
                .map_err(|err| io_err("write leaderboard row", path, err))?;
        }
        wtr.flush().map_err(|err| io_err("flush", path, err))
    }

    fn write_json(&self, path: &Path, value: &serde_json::Value) -> Result<(), RepositoryError> {
        let payload = serde_json::to_string_pretty(value)
            .map_err(|err| RepositoryError::Malformed(format!("failed to serialize json: {err}")))?;
        fs::write(path, payload).map_err(|err| io_err("write", path, err))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct FilesystemArtifactReader;

impl FilesystemArtifactReader {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Deserialize)]
struct SummaryFile {
    metrics: PerformanceMetrics,
}

#[derive(Debug, Deserialize)]
struct TradeRecord {
    timestamp_utc: i64,
    symbol: String,
    side: String,
    qty: f64,
    price: f64,
    commission: f64,
    slippage: f64,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct EquityRecord {
    timestamp_utc: i64,
    equity: f64,
    cash: f64,
    position_value: f64,
    unrealized_pnl: f64,
    realized_pnl: f64,
}

impl ArtifactReader for FilesystemArtifactReader {
    fn read_summary_json(&self, path: &Path) -> Result<PerformanceMetrics, RepositoryError> {
        let raw = fs::read_to_string(path).map_err(|err| io_err("read", path, err))?;
        let parsed: SummaryFile = serde_json::from_str(&raw).map_err(|err| {
            RepositoryError::Malformed(format!("invalid summary {}: {err}", path.display()))
        })?;
        Ok(parsed.metrics)
    }

    fn read_trades_csv(&self, path: &Path) -> Result<Vec<Trade>, RepositoryError> {
        let mut rdr = csv::Reader::from_path(path).map_err(|err| io_err("open", path, err))?;
        let mut trades = Vec::new();
        for result in rdr.deserialize::<TradeRecord>() {
            let record = result
                .map_err(|err| RepositoryError::Malformed(format!("failed to parse trade record: {err}")))?;
            let side = match record.side.to_uppercase().as_str() {
                "BUY" => Side::Buy,
                "SELL" => Side::Sell,
                other => return Err(RepositoryError::Malformed(format!("invalid side '{other}'"))),
            };
            let reason = match record.reason.as_str() {
                "signal" => TradeReason::Signal,
                "stop_loss" => TradeReason::StopLoss,
                "take_profit" => TradeReason::TakeProfit,
                other => return Err(RepositoryError::Malformed(format!("invalid reason '{other}'"))),
            };
            trades.push(Trade {
                timestamp: record.timestamp_utc,
                symbol: record.symbol,
                side,
                quantity: record.qty,
                price: record.price,
                commission: record.commission,
                slippage: record.slippage,
                reason,
            });
        }
        Ok(trades)
    }

    fn read_equity_csv(&self, path: &Path) -> Result<Vec<EquityPoint>, RepositoryError> {
        let mut rdr = csv::Reader::from_path(path).map_err(|err| io_err("open", path, err))?;
        let mut points = Vec::new();
        for result in rdr.deserialize::<EquityRecord>() {
            let record = result
                .map_err(|err| RepositoryError::Malformed(format!("failed to parse equity record: {err}")))?;
            points.push(EquityPoint {
                timestamp: record.timestamp_utc,
                equity: record.equity,
                cash: record.cash,
                position_value: record.position_value,
                unrealized_pnl: record.unrealized_pnl,
                realized_pnl: record.realized_pnl,
            });
        }
        Ok(points)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
