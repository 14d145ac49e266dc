use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_tmp_dir(name: &str) -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let dir = std::env::temp_dir().join(format!("stockcast_cli_{name}_{}_{}", std::process::id(), now));
    fs::create_dir_all(&dir).expect("create tmp dir");
    dir
}

fn stockcast(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_stockcast"))
        .args(args)
        .env("STOCKCAST_LOG", "warn")
        .output()
        .expect("run stockcast")
}

/// Weekday closes from 2023-08-01 through 2023-12-01.
fn write_fixture(dir: &Path) {
    let mut csv = String::from("timestamp_utc,open,high,low,close,volume\n");
    let mut day = 1690848000i64; // 2023-08-01
    let end = 1701388800i64; // 2023-12-01
    let mut idx = 0usize;
    while day <= end {
        // 1970-01-01 was a Thursday.
        let weekday = (day / 86_400 + 3) % 7;
        if weekday < 5 {
            let close = 180.0 + 6.0 * (idx as f64 / 4.0).sin() + 0.1 * idx as f64;
            let _ = writeln!(
                csv,
                "{day},{close:.2},{:.2},{:.2},{close:.2},50000000",
                close + 1.0,
                close - 1.0
            );
            idx += 1;
        }
        day += 86_400;
    }
    fs::write(dir.join("AAPL.csv"), csv).expect("write fixture");
}

fn write_config(dir: &Path) -> PathBuf {
    let config = format!(
        r#"
[run]
run_id = "cli_run"
symbol = "AAPL"
start = "2023-11-01"
end = "2023-12-01"

[data]
provider = "csv"
csv_dir = "{data}"

[cache]
path = "{cache}"

[model]
kind = "trend"

[trading]
min_confidence = 0.2
max_position_size = 0.5

[optimizer.space]
confidence_thresholds = [0.2, 0.6]
lookback_days = [5]
max_position_sizes = [0.5]

[paths]
out_dir = "{out}"
"#,
        data = dir.display(),
        cache = dir.join("cache").join("ohlcv.sqlite").display(),
        out = dir.join("runs").display(),
    );
    let path = dir.join("config.toml");
    fs::write(&path, config).expect("write config");
    path
}

#[test]
fn backtest_writes_artifacts_and_report_reads_them() {
    let dir = unique_tmp_dir("backtest");
    write_fixture(&dir);
    let config = write_config(&dir);
    let config = config.to_str().unwrap();

    let output = stockcast(&["backtest", "--config", config]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("signals=23"));

    let run_dir = dir.join("runs").join("cli_run");
    for file in ["signals.csv", "trades.csv", "equity.csv", "summary.json"] {
        assert!(run_dir.join(file).exists(), "missing {file}");
    }
    let signals = fs::read_to_string(run_dir.join("signals.csv")).unwrap();
    assert_eq!(signals.lines().count(), 24);

    let output = stockcast(&["report", "--input", run_dir.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("bars processed     23"));

    let output = stockcast(&["cache", "--config", config, "stats"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("AAPL"));

    let output = stockcast(&["cache", "--config", config, "clear"]);
    assert!(output.status.success());
    let output = stockcast(&["cache", "--config", config, "stats"]);
    assert!(String::from_utf8_lossy(&output.stdout).contains("is empty"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn optimize_writes_leaderboard() {
    let dir = unique_tmp_dir("optimize");
    write_fixture(&dir);
    let config = write_config(&dir);

    let output = stockcast(&["optimize", "--config", config.to_str().unwrap(), "--top", "2"]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let run_dir = dir.join("runs").join("cli_run");
    let leaderboard = fs::read_to_string(run_dir.join("leaderboard.csv")).unwrap();
    // header plus one row per combination
    assert_eq!(leaderboard.lines().count(), 3);
    assert!(run_dir.join("optimization.json").exists());
    assert!(String::from_utf8_lossy(&output.stdout).contains("out-of-sample"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn invalid_config_exits_with_error() {
    let dir = unique_tmp_dir("invalid");
    let path = dir.join("bad.toml");
    fs::write(
        &path,
        "[run]\nrun_id = \"x\"\nsymbol = \"AAPL\"\nstart = \"2023-12-01\"\nend = \"2023-11-01\"\n",
    )
    .unwrap();

    let output = stockcast(&["validate", "--config", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: invalid config"));

    let _ = fs::remove_dir_all(dir);
}
