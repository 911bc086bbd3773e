//! Kelly criterion: `f* = p - (1 - p) / b`.

/// Kelly fraction from per-trade outcomes, clamped to `[0, 1]`.
///
/// `p` is the share of winning trades, `b` the average win over the average
/// loss. With no losing trade the payoff ratio is unbounded and `f* = p`; with
/// no winning trade `f* = 0`. Break-even trades count toward the sample but
/// are neither wins nor losses.
pub fn kelly_fraction(outcomes: &[f64]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let (mut wins, mut win_sum, mut losses, mut loss_sum) = (0usize, 0.0, 0usize, 0.0);
    for &x in outcomes {
        if x > 0.0 {
            wins += 1;
            win_sum += x;
        } else if x < 0.0 {
            losses += 1;
            loss_sum -= x;
        }
    }
    if wins == 0 {
        return 0.0;
    }
    let p = wins as f64 / outcomes.len() as f64;
    if losses == 0 {
        return p;
    }
    let b = (win_sum / wins as f64) / (loss_sum / losses as f64);
    (p - (1.0 - p) / b).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textbook_example() {
        // p = 0.6, b = 1 → f* = 0.2
        let outcomes: Vec<f64> = [1.0; 6].iter().chain([-1.0; 4].iter()).copied().collect();
        assert!((kelly_fraction(&outcomes) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn payoff_ratio_matters() {
        // p = 0.5, b = 2 → f* = 0.25
        let outcomes = [2.0, -1.0, 2.0, -1.0];
        assert!((kelly_fraction(&outcomes) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn negative_edge_clamps_to_zero() {
        let outcomes = [1.0, -1.0, -1.0, -1.0];
        assert_eq!(kelly_fraction(&outcomes), 0.0);
    }

    #[test]
    fn degenerate_histories() {
        assert_eq!(kelly_fraction(&[]), 0.0);
        assert_eq!(kelly_fraction(&[-1.0, -2.0]), 0.0);
        assert_eq!(kelly_fraction(&[1.0, 2.0, 0.0, 3.0]), 0.75);
    }
}
