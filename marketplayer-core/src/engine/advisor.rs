//! Expert-advisor lifecycle: the driving loop around a `Simulator`.
//!
//! `run` calls `before_ticks` once, then `tick` / `advance` until the clock
//! reaches its end (or the tick cap), then `after_ticks`. Rejections returned
//! by the advisor are counted and logged; only invariant violations stop the run.

use super::error::{EngineError, InvariantViolation};
use super::simulator::Simulator;

/// Trading logic driven once per clock step.
pub trait ExpertAdvisor {
    fn before_ticks(&mut self, _sim: &mut Simulator) -> Result<(), EngineError> {
        Ok(())
    }

    fn tick(&mut self, sim: &mut Simulator) -> Result<(), EngineError>;

    fn after_ticks(&mut self, _sim: &mut Simulator) -> Result<(), EngineError> {
        Ok(())
    }
}

/// Counters from one `run`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub ticks: usize,
    pub rejections: usize,
    pub margin_call_ticks: usize,
    /// Whether the run stopped on the tick cap rather than the end of data.
    pub truncated: bool,
}

fn absorb(result: Result<(), EngineError>, stats: &mut RunStats) -> Result<(), InvariantViolation> {
    match result {
        Ok(()) => Ok(()),
        Err(EngineError::Fatal(violation)) => Err(violation),
        Err(EngineError::Rejected(rejection)) => {
            stats.rejections += 1;
            tracing::debug!(error = %rejection, "advisor request rejected");
            Ok(())
        }
    }
}

impl Simulator {
    /// Drive `advisor` over the whole data set, at most `max_ticks` steps.
    pub fn run<A: ExpertAdvisor + ?Sized>(
        &mut self,
        advisor: &mut A,
        max_ticks: Option<usize>,
    ) -> Result<RunStats, InvariantViolation> {
        let mut stats = RunStats::default();
        absorb(advisor.before_ticks(self), &mut stats)?;

        while !self.reached_end() {
            if max_ticks.is_some_and(|cap| stats.ticks >= cap) {
                stats.truncated = true;
                break;
            }
            absorb(advisor.tick(self), &mut stats)?;
            let events = self.advance()?;
            if events.margin_call {
                stats.margin_call_ticks += 1;
            }
            stats.ticks += 1;
        }

        absorb(advisor.after_ticks(self), &mut stats)?;
        self.verify_invariants()?;
        tracing::info!(
            ticks = stats.ticks,
            rejections = stats.rejections,
            balance = self.account().balance(),
            equity = self.account().equity(),
            "run finished"
        );
        Ok(stats)
    }
}
