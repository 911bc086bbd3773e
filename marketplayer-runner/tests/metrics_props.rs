//! Property tests for the run metrics.

use marketplayer_runner::metrics::{max_drawdown, profit_factor, total_return, win_rate};
use proptest::prelude::*;

proptest! {
    #[test]
    fn drawdown_is_a_bounded_negative_fraction(
        curve in prop::collection::vec(1.0..1_000_000.0_f64, 1..200),
    ) {
        let dd = max_drawdown(&curve);
        prop_assert!((-1.0..=0.0).contains(&dd), "drawdown {}", dd);
    }

    #[test]
    fn monotone_curve_has_no_drawdown(
        start in 1.0..10_000.0_f64,
        steps in prop::collection::vec(0.0..100.0_f64, 1..100),
    ) {
        let curve: Vec<f64> = steps
            .iter()
            .scan(start, |eq, s| {
                *eq += s;
                Some(*eq)
            })
            .collect();
        prop_assert_eq!(max_drawdown(&curve), 0.0);
        prop_assert!(total_return(&curve) >= 0.0);
    }

    #[test]
    fn trade_ratios_stay_in_range(
        profits in prop::collection::vec(-1_000.0..1_000.0_f64, 0..100),
    ) {
        let wr = win_rate(&profits);
        prop_assert!((0.0..=1.0).contains(&wr));
        let pf = profit_factor(&profits);
        prop_assert!((0.0..=100.0).contains(&pf));
    }
}
