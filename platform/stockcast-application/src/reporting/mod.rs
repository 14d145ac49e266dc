use crate::error::AppError;
use crate::optimization::OptimizationReport;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Instant;
use stockcast_domain::entities::metrics::{fills_by_side, PerformanceMetrics};
use stockcast_domain::repositories::artifacts::ArtifactReader;
use stockcast_domain::repositories::RepositoryError;
use stockcast_domain::services::engine::SkipReason;
use stockcast_domain::value_objects::trade::Trade;
use tracing::info_span;

pub struct RunReport {
    pub input_dir: PathBuf,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity_points: usize,
}

/// Reads a finished run directory back. `summary.json` and `trades.csv` are
/// required; `equity.csv` is optional.
pub fn generate_report(input_dir: &Path, reader: &dyn ArtifactReader) -> Result<RunReport, AppError> {
    let _span = info_span!("generate_report", input_dir = %input_dir.display()).entered();
    let stage_start = Instant::now();

    let summary_path = input_dir.join("summary.json");
    let trades_path = input_dir.join("trades.csv");
    if !reader.exists(&summary_path) || !reader.exists(&trades_path) {
        return Err(RepositoryError::Unavailable(format!(
            "missing summary.json or trades.csv in {}",
            input_dir.display()
        ))
        .into());
    }
    let metrics = reader.read_summary_json(&summary_path)?;
    let trades = reader.read_trades_csv(&trades_path)?;

    let equity_path = input_dir.join("equity.csv");
    let equity = if reader.exists(&equity_path) {
        reader.read_equity_csv(&equity_path)?
    } else {
        Vec::new()
    };
    if let Some(last) = equity.last() {
        if (last.equity - metrics.final_equity).abs() > 1e-6 {
            tracing::warn!(
                summary = metrics.final_equity,
                curve = last.equity,
                "final equity in summary.json disagrees with equity.csv"
            );
        }
    }
    if trades.len() != metrics.total_trades {
        tracing::warn!(
            summary = metrics.total_trades,
            rows = trades.len(),
            "fill count in summary.json disagrees with trades.csv"
        );
    }

    metrics::histogram!("stockcast.report.generate_ms")
        .record(stage_start.elapsed().as_secs_f64() * 1000.0);
    Ok(RunReport {
        input_dir: input_dir.to_path_buf(),
        metrics,
        trades,
        equity_points: equity.len(),
    })
}

pub fn render_summary(
    metrics: &PerformanceMetrics,
    trades: &[Trade],
    skipped: Option<&BTreeMap<SkipReason, usize>>,
) -> String {
    let (buys, sells) = fills_by_side(trades);
    let mut out = String::new();
    let _ = writeln!(out, "bars processed     {}", metrics.bars_processed);
    let _ = writeln!(out, "initial capital    {:.2}", metrics.initial_capital);
    let _ = writeln!(out, "final equity       {:.2}", metrics.final_equity);
    let _ = writeln!(out, "total return       {:.2}%", metrics.total_return_pct);
    let _ = writeln!(out, "annualized return  {:.2}%", metrics.annualized_return_pct);
    if let Some(bh) = metrics.buy_and_hold_return_pct {
        let _ = writeln!(out, "buy & hold return  {bh:.2}%");
    }
    let _ = writeln!(out, "sharpe ratio       {:.3}", metrics.sharpe_ratio);
    let _ = writeln!(out, "max drawdown       {:.2}%", metrics.max_drawdown_pct);
    let _ = writeln!(
        out,
        "fills              {} ({buys} buy / {sells} sell)",
        metrics.total_trades
    );
    let _ = writeln!(
        out,
        "round trips        {} ({} won / {} lost)",
        metrics.round_trips, metrics.winning_trades, metrics.losing_trades
    );
    let _ = writeln!(out, "win rate           {:.1}%", metrics.win_rate * 100.0);
    match metrics.profit_factor {
        Some(pf) => {
            let _ = writeln!(out, "profit factor      {pf:.2}");
        }
        None => {
            let _ = writeln!(out, "profit factor      n/a");
        }
    }
    let _ = writeln!(
        out,
        "costs              {:.2} commission, {:.2} slippage",
        metrics.total_commission, metrics.total_slippage
    );
    if let Some(skipped) = skipped.filter(|s| !s.is_empty()) {
        let parts: Vec<String> = skipped
            .iter()
            .map(|(reason, count)| format!("{}={count}", reason.as_str()))
            .collect();
        let _ = writeln!(out, "skipped signals    {}", parts.join(", "));
    }
    out
}

pub fn render_leaderboard(report: &OptimizationReport, top: usize) -> String {
    let mut out = String::new();
    let split = &report.split;
    let _ = writeln!(
        out,
        "train {}..{} ({} rows), embargo {} rows, test {}..{} ({} rows)",
        split.train_start,
        split.train_end,
        split.train_rows,
        split.embargo_rows,
        split.test_start,
        split.test_end,
        split.test_rows
    );
    let _ = writeln!(
        out,
        "{} search, ranked by {}",
        report.method,
        report.metric.as_str()
    );
    for row in report.leaderboard().iter().take(top) {
        let _ = writeln!(
            out,
            "{:>3}. score={:.4} return={:.2}% trades={} conf={} lookback={} size={} sl={} tp={}",
            row.rank,
            row.score,
            row.total_return_pct,
            row.total_trades,
            row.confidence_threshold,
            row.lookback_days,
            row.max_position_size,
            row.stop_loss_pct.map_or_else(|| "none".to_string(), |v| v.to_string()),
            row.take_profit_pct.map_or_else(|| "none".to_string(), |v| v.to_string()),
        );
    }
    let oos = &report.out_of_sample;
    let _ = writeln!(
        out,
        "out-of-sample: score={:.4} return={:.2}% sharpe={:.3} max_dd={:.2}% trades={}",
        oos.score,
        oos.metrics.total_return_pct,
        oos.metrics.sharpe_ratio,
        oos.metrics.max_drawdown_pct,
        oos.metrics.total_trades
    );
    out
}

#[cfg(test)]
mod tests {
    use super::render_summary;
    use std::collections::BTreeMap;
    use stockcast_domain::entities::metrics::PerformanceMetrics;
    use stockcast_domain::services::engine::SkipReason;
    use stockcast_domain::value_objects::side::Side;
    use stockcast_domain::value_objects::trade::{Trade, TradeReason};

    #[test]
    fn summary_lists_fills_and_skips() {
        let trade = |side| Trade {
            timestamp: 1,
            symbol: "AAPL".to_string(),
            side,
            quantity: 1.0,
            price: 100.0,
            commission: 0.1,
            slippage: 0.05,
            reason: TradeReason::Signal,
        };
        let metrics = PerformanceMetrics {
            total_trades: 3,
            profit_factor: None,
            ..PerformanceMetrics::default()
        };
        let skipped = BTreeMap::from([(SkipReason::BelowConfidence, 4)]);
        let text = render_summary(
            &metrics,
            &[trade(Side::Buy), trade(Side::Sell), trade(Side::Buy)],
            Some(&skipped),
        );
        assert!(text.contains("3 (2 buy / 1 sell)"));
        assert!(text.contains("profit factor      n/a"));
        assert!(text.contains("below_confidence=4"));
        assert!(!text.contains("buy & hold"));
    }
}
