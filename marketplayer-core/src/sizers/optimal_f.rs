//! Optimal f and Secure f (Ralph Vince).
//!
//! Each outcome is scaled by the largest loss, `r_i = X_i / |largest loss|`, so
//! every holding-period return `1 + f * r_i` stays positive on `[0, 1)`. The
//! log-growth `G(f) = Σ ln(1 + f * r_i)` is concave: optimal f is the root of
//! `G'`, found by bisection. Secure f is the inflection point of the terminal
//! wealth relative `TWR = exp(G)`, where `G'^2 + G'' = 0`, which always sits
//! below optimal f.

use super::{largest_loss, SizingError};
use crate::domain::Instrument;

const ITERATIONS: usize = 200;
const TOLERANCE: f64 = 1e-12;

fn scaled(outcomes: &[f64], loss: f64) -> Vec<f64> {
    outcomes.iter().map(|x| x / loss).collect()
}

/// `G'(f)`.
fn growth_slope(r: &[f64], f: f64) -> f64 {
    r.iter().map(|ri| ri / (1.0 + f * ri)).sum()
}

/// `G''(f)`.
fn growth_curvature(r: &[f64], f: f64) -> f64 {
    -r.iter().map(|ri| ri * ri / (1.0 + f * ri).powi(2)).sum::<f64>()
}

/// `TWR''/TWR = G'^2 + G''`, positive while TWR is still convex.
fn acceleration(r: &[f64], f: f64) -> f64 {
    growth_slope(r, f).powi(2) + growth_curvature(r, f)
}

/// Root of a function positive at `lo` and non-positive at `hi`.
fn bisect(mut lo: f64, mut hi: f64, g: impl Fn(f64) -> f64) -> f64 {
    for _ in 0..ITERATIONS {
        if hi - lo < TOLERANCE {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if g(mid) > 0.0 {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// Growth-maximising fraction in `[0, 1]`.
///
/// 1.0 when no trade lost (growth is unbounded), 0.0 when the outcomes have no
/// positive expectancy.
pub fn optimal_f(outcomes: &[f64]) -> f64 {
    let Some(loss) = largest_loss(outcomes) else {
        return if outcomes.iter().any(|x| *x > 0.0) { 1.0 } else { 0.0 };
    };
    let r = scaled(outcomes, loss);
    if r.iter().sum::<f64>() <= 0.0 {
        return 0.0;
    }
    // G' → -∞ as f → 1 because the largest loss has r = -1.
    bisect(0.0, 1.0 - 1e-12, |f| growth_slope(&r, f))
}

/// Fraction at the TWR inflection point, in `[0, optimal_f]`.
///
/// 0.0 when TWR is concave from the start, or when there is no edge.
pub fn secure_f(outcomes: &[f64]) -> f64 {
    let Some(loss) = largest_loss(outcomes) else {
        return optimal_f(outcomes);
    };
    let f_opt = optimal_f(outcomes);
    if f_opt <= 0.0 {
        return 0.0;
    }
    let r = scaled(outcomes, loss);
    if acceleration(&r, 0.0) <= 0.0 {
        return 0.0;
    }
    bisect(0.0, f_opt, |f| acceleration(&r, f))
}

/// Blend of the two: `value * optimal_f + (1 - value) * secure_f`.
pub fn fractional_f(outcomes: &[f64], value: f64) -> f64 {
    value * optimal_f(outcomes) + (1.0 - value) * secure_f(outcomes)
}

/// Convert an f-fraction to lots: one unit risks `largest_loss_per_lot`, so
/// `lots = equity * f / largest_loss_per_lot`, floored to the lot step.
pub fn fraction_to_lots(
    f: f64,
    equity: f64,
    largest_loss_per_lot: f64,
    instrument: &Instrument,
) -> Result<f64, SizingError> {
    if !(0.0..=1.0).contains(&f) {
        return Err(SizingError::FractionOutOfRange(f));
    }
    if largest_loss_per_lot <= 0.0 {
        return Err(SizingError::NoLossObserved);
    }
    Ok(instrument.normalize_lots(equity * f / largest_loss_per_lot))
}
