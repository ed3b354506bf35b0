//! Termination policies.
//!
//! Terminations are only consulted between complete move cycles, so a
//! search never stops with a half-applied move.

use std::time::Duration;

/// Counters the engine exposes to its termination policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchProgress {
    /// Completed iterations
    pub iteration: u64,
    /// Completed iterations since the last new best score
    pub unimproved: u64,
    pub elapsed: Duration,
}

pub trait Termination: Send {
    fn name(&self) -> String;

    fn phase_started(&mut self) {}

    fn is_terminated(&self, progress: &SearchProgress) -> bool;

    /// Fraction of the budget spent, if this policy has a known budget.
    fn progress(&self, progress: &SearchProgress) -> Option<f64>;
}

/// Stops after a fixed number of iterations.
#[derive(Debug, Clone)]
pub struct StepCountTermination {
    pub max_iterations: u64,
}

impl StepCountTermination {
    pub fn new(max_iterations: u64) -> Self {
        StepCountTermination { max_iterations }
    }
}

impl Termination for StepCountTermination {
    fn name(&self) -> String {
        format!("StepCount({})", self.max_iterations)
    }

    fn is_terminated(&self, progress: &SearchProgress) -> bool {
        progress.iteration >= self.max_iterations
    }

    fn progress(&self, progress: &SearchProgress) -> Option<f64> {
        if self.max_iterations == 0 {
            return Some(1.0);
        }
        Some((progress.iteration as f64 / self.max_iterations as f64).min(1.0))
    }
}

/// Stops once the wall-clock budget is spent.
#[derive(Debug, Clone)]
pub struct TimeTermination {
    pub limit: Duration,
}

impl TimeTermination {
    pub fn new(limit: Duration) -> Self {
        TimeTermination { limit }
    }
}

impl Termination for TimeTermination {
    fn name(&self) -> String {
        format!("Time({:.3}s)", self.limit.as_secs_f64())
    }

    fn is_terminated(&self, progress: &SearchProgress) -> bool {
        progress.elapsed >= self.limit
    }

    fn progress(&self, progress: &SearchProgress) -> Option<f64> {
        if self.limit.is_zero() {
            return Some(1.0);
        }
        Some((progress.elapsed.as_secs_f64() / self.limit.as_secs_f64()).min(1.0))
    }
}

/// Stops after a number of iterations without a new best score.
#[derive(Debug, Clone)]
pub struct UnimprovedStepTermination {
    pub max_unimproved: u64,
}

impl UnimprovedStepTermination {
    pub fn new(max_unimproved: u64) -> Self {
        UnimprovedStepTermination { max_unimproved }
    }
}

impl Termination for UnimprovedStepTermination {
    fn name(&self) -> String {
        format!("Unimproved({})", self.max_unimproved)
    }

    fn is_terminated(&self, progress: &SearchProgress) -> bool {
        progress.unimproved >= self.max_unimproved
    }

    fn progress(&self, _progress: &SearchProgress) -> Option<f64> {
        None
    }
}

/// Stops as soon as any child stops.
pub struct CompositeTermination {
    terminations: Vec<Box<dyn Termination>>,
}

impl CompositeTermination {
    pub fn new() -> Self {
        CompositeTermination { terminations: Vec::new() }
    }

    pub fn add_termination<T: Termination + 'static>(&mut self, termination: T) {
        self.terminations.push(Box::new(termination));
    }

    pub fn push(&mut self, termination: Box<dyn Termination>) {
        self.terminations.push(termination);
    }

    pub fn is_empty(&self) -> bool {
        self.terminations.is_empty()
    }
}

impl Default for CompositeTermination {
    fn default() -> Self {
        Self::new()
    }
}

impl Termination for CompositeTermination {
    fn name(&self) -> String {
        let names: Vec<String> = self.terminations.iter().map(|t| t.name()).collect();
        format!("AnyOf[{}]", names.join(", "))
    }

    fn phase_started(&mut self) {
        for termination in &mut self.terminations {
            termination.phase_started();
        }
    }

    fn is_terminated(&self, progress: &SearchProgress) -> bool {
        self.terminations.iter().any(|t| t.is_terminated(progress))
    }

    fn progress(&self, progress: &SearchProgress) -> Option<f64> {
        self.terminations
            .iter()
            .filter_map(|t| t.progress(progress))
            .fold(None, |max, p| Some(max.map_or(p, |m: f64| m.max(p))))
    }
}
