//! End-to-end tests: TOML config + CSV quote files on disk through a full run,
//! a sweep, and artifact export.

use std::fmt::Write as _;
use std::path::Path;

use marketplayer_runner::export::import_json;
use marketplayer_runner::{
    run_simulation, run_sweep, save_artifacts, ConfigError, LoadError, ParamGrid, RunError,
    SimulationConfig,
};

// ── Fixtures ─────────────────────────────────────────────────────────

/// Hourly sine-wave closes around `base`, written as `timestamp,open,high,low,close`.
fn write_quotes(path: &Path, base: f64, n: usize) {
    let start = chrono::NaiveDate::from_ymd_opt(2024, 2, 5)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut text = String::from("timestamp,open,high,low,close\n");
    for i in 0..n {
        let ts = start + chrono::Duration::hours(i as i64);
        let close = base + (i as f64 * 0.2).sin() * 0.008;
        writeln!(
            text,
            "{},{:.5},{:.5},{:.5},{:.5}",
            ts.format("%Y-%m-%d %H:%M:%S"),
            close - 0.0002,
            close + 0.0006,
            close - 0.0006,
            close
        )
        .unwrap();
    }
    std::fs::write(path, text).unwrap();
}

fn write_config(dir: &Path, extra: &str) -> std::path::PathBuf {
    write_quotes(&dir.join("eurusd.csv"), 1.0850, 300);
    write_quotes(&dir.join("gbpusd.csv"), 1.2650, 300);
    let text = format!(
        r#"
[account]
balance = 10000.0
leverage = 100.0
currency = "USD"

[[instruments]]
symbol = "EURUSD"
quotes = "eurusd.csv"
period = "H1"
spread_pips = 0.5

[[instruments]]
symbol = "GBPUSD"
quotes = "gbpusd.csv"
period = "H1"

[advisor]
symbol = "EURUSD"
fast_period = 3
slow_period = 8
stop_loss_pips = 60.0
take_profit_pips = 120.0
{extra}
"#
    );
    let path = dir.join("run.toml");
    std::fs::write(&path, text).unwrap();
    path
}

// ── Single run ───────────────────────────────────────────────────────

#[test]
fn config_file_drives_full_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig::from_file(write_config(dir.path(), "")).unwrap();
    let report = run_simulation(&config).unwrap();

    // Two instruments of 300 ticks each.
    assert_eq!(report.ticks, 600);
    assert_eq!(report.symbol, "EURUSD");
    assert!(report.entries > 0);
    assert!(report.metrics.trade_count > 0);
    assert_eq!(report.equity_curve.len(), 600);
    assert!(report.closed_positions.iter().all(|c| c.position.symbol == "EURUSD"));
    let booked: f64 = report.closed_positions.iter().map(|c| c.profit).sum();
    assert!((report.final_balance - 10_000.0 - booked).abs() < 1e-6);
}

#[test]
fn history_sizing_runs_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let extra = "\n[advisor.sizing]\ntype = \"SECURE_F\"\nfallback_lots = 0.2\n\n[run]\nmin_observations = 5\nliquidation = \"close_worst_first\"\n";
    let config = SimulationConfig::from_file(write_config(dir.path(), extra)).unwrap();
    let report = run_simulation(&config).unwrap();
    assert!(report.entries > 0);
    assert_eq!(report.ticks, 600);
}

#[test]
fn missing_quote_file_is_a_data_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");
    std::fs::remove_file(dir.path().join("gbpusd.csv")).unwrap();
    let config = SimulationConfig::from_file(path).unwrap();
    assert!(matches!(
        run_simulation(&config),
        Err(RunError::Data(LoadError::Io { .. }))
    ));
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        SimulationConfig::from_file(dir.path().join("absent.toml")),
        Err(ConfigError::Io { .. })
    ));
}

#[test]
fn shift_beyond_series_is_an_instrument_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");
    let text = std::fs::read_to_string(&path)
        .unwrap()
        .replace("spread_pips = 0.5", "spread_pips = 0.5\nshift = 300");
    std::fs::write(&path, text).unwrap();
    let config = SimulationConfig::from_file(path).unwrap();
    assert!(matches!(run_simulation(&config), Err(RunError::Instrument(_))));
}

#[test]
fn tick_instrument_runs_alongside_candles() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "");
    let start = chrono::NaiveDate::from_ymd_opt(2024, 2, 5)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let mut ticks = String::from("timestamp,price\n");
    for i in 0..300 {
        let ts = start + chrono::Duration::minutes(30 * i);
        writeln!(ticks, "{},{:.5}", ts.format("%Y-%m-%d %H:%M:%S"), 1.2650 + (i as f64 * 0.3).cos() * 0.004).unwrap();
    }
    std::fs::write(dir.path().join("gbpusd.csv"), ticks).unwrap();
    let text = std::fs::read_to_string(&path)
        .unwrap()
        .replace("quotes = \"gbpusd.csv\"", "quotes = \"gbpusd.csv\"\nmode = \"TICK\"");
    std::fs::write(&path, text).unwrap();

    let config = SimulationConfig::from_file(path).unwrap();
    let report = run_simulation(&config).unwrap();
    assert_eq!(report.ticks, 600);
    assert!(report.equity_curve.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

// ── Sweep ────────────────────────────────────────────────────────────

#[test]
fn sweep_runs_every_valid_pair() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig::from_file(write_config(dir.path(), "")).unwrap();
    let grid = ParamGrid::new(vec![2, 4, 10], vec![10, 20]);
    let results = run_sweep(&config, &grid).unwrap();

    // (10, 10) is skipped.
    assert_eq!(results.len(), 5);
    let best = results.best().unwrap();
    assert!(results
        .all()
        .iter()
        .all(|r| r.metrics.total_return <= best.metrics.total_return));
}

// ── Export ───────────────────────────────────────────────────────────

#[test]
fn artifacts_round_trip_through_json() {
    let dir = tempfile::tempdir().unwrap();
    let config = SimulationConfig::from_file(write_config(dir.path(), "")).unwrap();
    let report = run_simulation(&config).unwrap();

    let out = save_artifacts(&report, &dir.path().join("out")).unwrap();
    let json = std::fs::read_to_string(out.join("report.json")).unwrap();
    let back = import_json(&json).unwrap();
    assert_eq!(back.ticks, report.ticks);
    assert_eq!(back.closed_positions.len(), report.closed_positions.len());

    let trades = std::fs::read_to_string(out.join("trades.csv")).unwrap();
    assert_eq!(trades.lines().count(), report.closed_positions.len() + 1);
    let equity = std::fs::read_to_string(out.join("equity.csv")).unwrap();
    assert_eq!(equity.lines().count(), report.equity_curve.len() + 1);
}

// ── Demo ─────────────────────────────────────────────────────────────

#[test]
fn shipped_demo_config_runs() {
    let path = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("demos/demo.toml");
    let config = SimulationConfig::from_file(path).unwrap();
    let report = run_simulation(&config).unwrap();
    assert_eq!(report.ticks, 480);
    assert!(report.entries > 0);
}
