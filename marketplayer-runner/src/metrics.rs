//! Run metrics: pure functions over the equity curve and closed trades.

use marketplayer_core::domain::{ClosedPosition, EquitySnapshot};
use serde::{Deserialize, Serialize};

/// Summary statistics of one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunMetrics {
    pub total_return: f64,
    /// Largest peak-to-trough equity decline as a negative fraction.
    pub max_drawdown: f64,
    pub trade_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub net_profit: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
}

impl RunMetrics {
    /// `initial_balance` anchors the curve so a run that loses on its first
    /// tick still registers the drawdown.
    pub fn compute(initial_balance: f64, history: &[EquitySnapshot], trades: &[ClosedPosition]) -> Self {
        let curve: Vec<f64> = std::iter::once(initial_balance)
            .chain(history.iter().map(|s| s.equity))
            .collect();
        let profits: Vec<f64> = trades.iter().map(|t| t.profit).collect();
        Self {
            total_return: total_return(&curve),
            max_drawdown: max_drawdown(&curve),
            trade_count: trades.len(),
            win_rate: win_rate(&profits),
            profit_factor: profit_factor(&profits),
            net_profit: profits.iter().sum(),
            largest_win: profits.iter().copied().fold(0.0, f64::max),
            largest_loss: profits.iter().copied().fold(0.0, f64::min),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(equity_curve: &[f64]) -> f64 {
    let (Some(&initial), Some(&last)) = (equity_curve.first(), equity_curve.last()) else {
        return 0.0;
    };
    if equity_curve.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    (last - initial) / initial
}

/// Maximum drawdown as a negative fraction (e.g. -0.25 for 25%).
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let Some(&first) = equity_curve.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity_curve {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.min((eq - peak) / peak);
        }
    }
    max_dd
}

/// Fraction of trades with a strictly positive profit.
pub fn win_rate(profits: &[f64]) -> f64 {
    if profits.is_empty() {
        return 0.0;
    }
    let winners = profits.iter().filter(|p| **p > 0.0).count();
    winners as f64 / profits.len() as f64
}

/// Gross profits / gross losses, capped at 100.0 when nothing lost.
pub fn profit_factor(profits: &[f64]) -> f64 {
    let gross_profit: f64 = profits.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = profits.iter().filter(|p| **p < 0.0).map(|p| p.abs()).sum();
    if gross_loss < 1e-10 {
        return if gross_profit > 0.0 { 100.0 } else { 0.0 };
    }
    (gross_profit / gross_loss).min(100.0)
}
