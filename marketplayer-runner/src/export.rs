//! Report export: JSON and CSV artifacts.
//!
//! - **JSON**: the full `RunReport`, schema-versioned
//! - **CSV**: closed-trade tape and the per-tick equity curve
//!
//! Unknown schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use marketplayer_core::domain::{ClosedPosition, EquitySnapshot};

use crate::runner::{RunReport, SCHEMA_VERSION};

// ─── JSON export ────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize RunReport to JSON")
}

/// Deserialize a `RunReport`, rejecting schema versions newer than this build.
pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize RunReport from JSON")?;
    if report.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            report.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(report)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: ticket, symbol, direction, lots, open_time, open_price,
/// close_time, close_price, stop_loss, take_profit, profit, reason
pub fn export_trades_csv(trades: &[ClosedPosition]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "ticket",
        "symbol",
        "direction",
        "lots",
        "open_time",
        "open_price",
        "close_time",
        "close_price",
        "stop_loss",
        "take_profit",
        "profit",
        "reason",
    ])?;
    for t in trades {
        let p = &t.position;
        wtr.write_record([
            &p.ticket.0.to_string(),
            &p.symbol,
            &format!("{:?}", p.direction),
            &format!("{:.2}", p.lots),
            &p.open_time.to_string(),
            &format!("{:.5}", p.open_price),
            &t.close_time.to_string(),
            &format!("{:.5}", t.close_price),
            &format!("{:.5}", p.stop_loss),
            &format!("{:.5}", p.take_profit),
            &format!("{:.2}", t.profit),
            &format!("{:?}", t.reason),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(history: &[EquitySnapshot]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "balance", "equity", "margin", "free_margin"])?;
    for s in history {
        wtr.write_record([
            &s.timestamp.to_string(),
            &format!("{:.2}", s.balance),
            &format!("{:.2}", s.equity),
            &format!("{:.2}", s.margin),
            &format!("{:.2}", s.free_margin()),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write `report.json`, `trades.csv`, and `equity.csv` into `output_dir`,
/// creating it if needed. Returns the directory.
pub fn save_artifacts(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create artifact dir: {}", output_dir.display()))?;

    std::fs::write(output_dir.join("report.json"), export_json(report)?)?;
    std::fs::write(
        output_dir.join("trades.csv"),
        export_trades_csv(&report.closed_positions)?,
    )?;
    std::fs::write(output_dir.join("equity.csv"), export_equity_csv(&report.equity_curve)?)?;

    Ok(output_dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::RunMetrics;
    use chrono::NaiveDate;
    use marketplayer_core::domain::{CloseReason, Direction, Position, Ticket};

    fn report() -> RunReport {
        let t0 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let t1 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(10, 0, 0).unwrap();
        let position = Position {
            ticket: Ticket(1),
            symbol: "EURUSD".into(),
            direction: Direction::Buy,
            lots: 0.1,
            open_price: 1.2,
            open_time: t0,
            stop_loss: 0.0,
            take_profit: 1.21,
            margin: 120.0,
            profit: 0.0,
        };
        let closed = ClosedPosition {
            position,
            close_price: 1.21,
            close_time: t1,
            profit: 100.0,
            reason: CloseReason::TakeProfit,
        };
        let equity = vec![
            EquitySnapshot { timestamp: t0, balance: 10_000.0, equity: 10_000.0, margin: 120.0 },
            EquitySnapshot { timestamp: t1, balance: 10_100.0, equity: 10_100.0, margin: 0.0 },
        ];
        RunReport {
            schema_version: SCHEMA_VERSION,
            symbol: "EURUSD".into(),
            fast_period: 5,
            slow_period: 20,
            initial_balance: 10_000.0,
            final_balance: 10_100.0,
            final_equity: 10_100.0,
            final_margin: 0.0,
            open_positions: 0,
            ticks: 2,
            entries: 1,
            skipped_entries: 0,
            rejections: 0,
            margin_call_ticks: 0,
            truncated: false,
            metrics: RunMetrics::compute(10_000.0, &equity, std::slice::from_ref(&closed)),
            equity_curve: equity,
            closed_positions: vec![closed],
        }
    }

    #[test]
    fn json_roundtrip() {
        let report = report();
        let back = import_json(&export_json(&report).unwrap()).unwrap();
        assert_eq!(back.closed_positions, report.closed_positions);
        assert_eq!(back.metrics.trade_count, 1);
    }

    #[test]
    fn future_schema_rejected() {
        let mut report = report();
        report.schema_version = SCHEMA_VERSION + 1;
        let json = export_json(&report).unwrap();
        assert!(import_json(&json).is_err());
    }

    #[test]
    fn trades_csv_has_header_and_row() {
        let csv = export_trades_csv(&report().closed_positions).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ticket,symbol,direction"));
        assert!(lines[1].starts_with("1,EURUSD,Buy,0.10,"));
        assert!(lines[1].ends_with(",100.00,TakeProfit"));
    }

    #[test]
    fn equity_csv_includes_free_margin() {
        let csv = export_equity_csv(&report().equity_curve).unwrap();
        let first = csv.lines().nth(1).unwrap();
        assert_eq!(first, "2024-01-02 09:00:00,10000.00,10000.00,120.00,9880.00");
    }

    #[test]
    fn artifacts_written_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let out = save_artifacts(&report(), &dir.path().join("run")).unwrap();
        for name in ["report.json", "trades.csv", "equity.csv"] {
            assert!(out.join(name).exists(), "missing {name}");
        }
    }
}
