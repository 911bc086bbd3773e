//! Parameter sweep over moving-average periods.
//!
//! Quotes are loaded once; each run clones the instruments (sharing their
//! series) and owns its own account and cursors, so runs execute in parallel.

use rayon::prelude::*;

use crate::config::SimulationConfig;
use crate::runner::{run_with_data, MarketData, RunError, RunReport};

/// Fast × slow period grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamGrid {
    pub fast_periods: Vec<usize>,
    pub slow_periods: Vec<usize>,
}

impl ParamGrid {
    pub fn new(fast_periods: Vec<usize>, slow_periods: Vec<usize>) -> Self {
        Self { fast_periods, slow_periods }
    }

    /// Number of raw combinations, including ones `combinations()` skips.
    pub fn size(&self) -> usize {
        self.fast_periods.len() * self.slow_periods.len()
    }

    /// All `(fast, slow)` pairs with `0 < fast < slow`.
    pub fn combinations(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast_periods {
            for &slow in &self.slow_periods {
                // Skip invalid combinations (fast >= slow)
                if fast == 0 || fast >= slow {
                    continue;
                }
                pairs.push((fast, slow));
            }
        }
        pairs
    }
}

/// Sweep executor over one configuration and its pre-loaded data.
#[derive(Debug)]
pub struct ParamSweep<'a> {
    config: &'a SimulationConfig,
    market: &'a MarketData,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(config: &'a SimulationConfig, market: &'a MarketData) -> Self {
        Self { config, market, parallel: true }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every valid grid point. Fails on the first run error.
    pub fn sweep(&self, grid: &ParamGrid) -> Result<SweepResults, RunError> {
        let pairs = grid.combinations();
        tracing::info!(runs = pairs.len(), parallel = self.parallel, "starting sweep");

        let run = |&(fast, slow): &(usize, usize)| run_with_data(self.config, self.market, fast, slow);
        let reports = if self.parallel {
            pairs.par_iter().map(run).collect::<Result<Vec<_>, _>>()?
        } else {
            pairs.iter().map(run).collect::<Result<Vec<_>, _>>()?
        };
        Ok(SweepResults::new(reports))
    }
}

/// Load the config's quotes and sweep `grid` in parallel.
pub fn run_sweep(config: &SimulationConfig, grid: &ParamGrid) -> Result<SweepResults, RunError> {
    let market = MarketData::load(config)?;
    ParamSweep::new(config, &market).sweep(grid)
}

/// Reports from a sweep, in grid order.
#[derive(Debug, Clone)]
pub struct SweepResults {
    reports: Vec<RunReport>,
}

impl SweepResults {
    fn new(reports: Vec<RunReport>) -> Self {
        Self { reports }
    }

    pub fn all(&self) -> &[RunReport] {
        &self.reports
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    pub fn get(&self, fast: usize, slow: usize) -> Option<&RunReport> {
        self.reports
            .iter()
            .find(|r| r.fast_period == fast && r.slow_period == slow)
    }

    /// Reports sorted by total return (descending).
    pub fn sorted_by_return(&self) -> Vec<&RunReport> {
        let mut sorted: Vec<_> = self.reports.iter().collect();
        sorted.sort_by(|a, b| {
            b.metrics
                .total_return
                .partial_cmp(&a.metrics.total_return)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&RunReport> {
        self.sorted_by_return().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&RunReport> {
        self.sorted_by_return().into_iter().next()
    }
}
