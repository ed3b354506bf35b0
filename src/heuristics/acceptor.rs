//! Acceptance policies for local search.
//!
//! The engine applies every candidate move and then asks the acceptor whether
//! to keep it. A rejected move is undone by the engine.

use crate::score::HardSoftScore;
use crate::solution::Move;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

/// What an acceptor sees of one search step.
#[derive(Debug, Clone, Copy)]
pub struct StepScope<'a> {
    pub iteration: u64,
    /// Fraction of the termination budget spent, in `[0, 1]`
    pub progress: f64,
    /// Score before the move
    pub current: HardSoftScore,
    /// Score after the move
    pub candidate: HardSoftScore,
    /// Best score found so far
    pub best: HardSoftScore,
    pub mv: &'a Move,
}

pub trait Acceptor: Send {
    fn name(&self) -> &str;

    fn phase_started(&mut self, _initial: HardSoftScore) {}

    fn is_accepted(&mut self, step: &StepScope<'_>, rng: &mut ChaCha8Rng) -> bool;

    fn step_ended(&mut self, _step: &StepScope<'_>, _accepted: bool) {}
}

/// Accepts a move iff it does not make the score worse.
#[derive(Debug, Clone, Default)]
pub struct HillClimbing;

impl Acceptor for HillClimbing {
    fn name(&self) -> &str {
        "HillClimbing"
    }

    fn is_accepted(&mut self, step: &StepScope<'_>, _rng: &mut ChaCha8Rng) -> bool {
        step.candidate >= step.current
    }
}

/// Simulated Annealing
///
/// Accepts worse solutions with probability `exp(delta / T)`, where the hard
/// delta is scaled by `hard_weight` and the temperature decays geometrically
/// from `initial_temperature` to `final_temperature` over the search budget.
#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    pub initial_temperature: f64,
    pub final_temperature: f64,
    /// Soft units one unit of hard score is worth
    pub hard_weight: f64,
}

impl SimulatedAnnealing {
    pub fn new() -> Self {
        SimulatedAnnealing {
            initial_temperature: 1000.0,
            final_temperature: 0.1,
            hard_weight: 10_000.0,
        }
    }

    pub fn with_params(initial_temperature: f64, final_temperature: f64, hard_weight: f64) -> Self {
        SimulatedAnnealing { initial_temperature, final_temperature, hard_weight }
    }

    pub fn temperature(&self, progress: f64) -> f64 {
        let ratio = self.final_temperature / self.initial_temperature;
        self.initial_temperature * ratio.powf(progress.clamp(0.0, 1.0))
    }
}

impl Default for SimulatedAnnealing {
    fn default() -> Self {
        Self::new()
    }
}

impl Acceptor for SimulatedAnnealing {
    fn name(&self) -> &str {
        "SimulatedAnnealing"
    }

    fn is_accepted(&mut self, step: &StepScope<'_>, rng: &mut ChaCha8Rng) -> bool {
        if step.candidate >= step.current {
            return true;
        }
        let temperature = self.temperature(step.progress);
        if temperature <= 0.0 {
            return false;
        }

        let diff = step.candidate - step.current;
        let energy = diff.hard as f64 * self.hard_weight + diff.soft as f64;
        let prob = (energy / temperature).exp();
        rng.gen::<f64>() < prob
    }
}

/// Tabu Search acceptor
///
/// Consumers moved by an accepted move stay tabu for `tenure` iterations.
/// A move touching a tabu consumer is only accepted if it beats the best
/// score (aspiration); other moves are accepted if they do not worsen the
/// current score.
#[derive(Debug, Clone)]
pub struct TabuSearch {
    pub tenure: u64,
    /// consumer -> first iteration at which it is no longer tabu
    tabu_list: HashMap<usize, u64>,
}

impl TabuSearch {
    pub fn new(tenure: u64) -> Self {
        TabuSearch {
            tenure,
            tabu_list: HashMap::new(),
        }
    }

    fn is_tabu(&self, consumer: usize, iteration: u64) -> bool {
        self.tabu_list
            .get(&consumer)
            .map(|&expiry| expiry > iteration)
            .unwrap_or(false)
    }
}

impl Default for TabuSearch {
    fn default() -> Self {
        Self::new(7)
    }
}

impl Acceptor for TabuSearch {
    fn name(&self) -> &str {
        "TabuSearch"
    }

    fn phase_started(&mut self, _initial: HardSoftScore) {
        self.tabu_list.clear();
    }

    fn is_accepted(&mut self, step: &StepScope<'_>, _rng: &mut ChaCha8Rng) -> bool {
        let (first, second) = step.mv.consumers();
        let tabu = self.is_tabu(first, step.iteration)
            || second.map(|c| self.is_tabu(c, step.iteration)).unwrap_or(false);

        if tabu {
            step.candidate > step.best
        } else {
            step.candidate >= step.current
        }
    }

    fn step_ended(&mut self, step: &StepScope<'_>, accepted: bool) {
        if !accepted {
            return;
        }
        let expiry = step.iteration + self.tenure;
        let (first, second) = step.mv.consumers();
        self.tabu_list.insert(first, expiry);
        if let Some(c) = second {
            self.tabu_list.insert(c, expiry);
        }
        if self.tabu_list.len() > 4 * self.tenure as usize + 16 {
            let iteration = step.iteration;
            self.tabu_list.retain(|_, expiry| *expiry > iteration);
        }
    }
}

/// Late Acceptance
///
/// Accepts a move if it does not worsen the current score or if it is at
/// least as good as the score `size` steps ago.
#[derive(Debug, Clone)]
pub struct LateAcceptance {
    pub size: usize,
    history: Vec<HardSoftScore>,
}

impl LateAcceptance {
    pub fn new(size: usize) -> Self {
        LateAcceptance {
            size: size.max(1),
            history: Vec::new(),
        }
    }

    fn slot(&self, iteration: u64) -> usize {
        (iteration % self.size as u64) as usize
    }
}

impl Default for LateAcceptance {
    fn default() -> Self {
        Self::new(400)
    }
}

impl Acceptor for LateAcceptance {
    fn name(&self) -> &str {
        "LateAcceptance"
    }

    fn phase_started(&mut self, initial: HardSoftScore) {
        self.history = vec![initial; self.size];
    }

    fn is_accepted(&mut self, step: &StepScope<'_>, _rng: &mut ChaCha8Rng) -> bool {
        if self.history.is_empty() {
            self.history = vec![step.current; self.size];
        }
        step.candidate >= step.current || step.candidate >= self.history[self.slot(step.iteration)]
    }

    fn step_ended(&mut self, step: &StepScope<'_>, accepted: bool) {
        let slot = self.slot(step.iteration);
        if let Some(entry) = self.history.get_mut(slot) {
            *entry = if accepted { step.candidate } else { step.current };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MV: Move = Move::Reassign { consumer: 0, from: Some(0), to: Some(1) };

    fn step(current: HardSoftScore, candidate: HardSoftScore, best: HardSoftScore) -> StepScope<'static> {
        StepScope { iteration: 0, progress: 0.0, current, candidate, best, mv: &MV }
    }

    #[test]
    fn test_hill_climbing() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut acceptor = HillClimbing;
        let current = HardSoftScore::new(0, -100);

        assert!(acceptor.is_accepted(&step(current, HardSoftScore::new(0, -90), current), &mut rng));
        assert!(acceptor.is_accepted(&step(current, current, current), &mut rng));
        assert!(!acceptor.is_accepted(&step(current, HardSoftScore::new(0, -101), current), &mut rng));
    }

    #[test]
    fn test_annealing_temperature_schedule() {
        let sa = SimulatedAnnealing::with_params(100.0, 1.0, 1.0);
        assert!((sa.temperature(0.0) - 100.0).abs() < 1e-9);
        assert!((sa.temperature(0.5) - 10.0).abs() < 1e-9);
        assert!((sa.temperature(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_annealing_rejects_large_worsening_when_cold() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut sa = SimulatedAnnealing::with_params(1.0, 0.001, 1_000.0);
        let current = HardSoftScore::new(0, -100);
        let mut cold = step(current, HardSoftScore::new(-1, -100), current);
        cold.progress = 1.0;

        for _ in 0..100 {
            assert!(!sa.is_accepted(&cold, &mut rng));
        }
        assert!(sa.is_accepted(&step(current, HardSoftScore::new(0, -50), current), &mut rng));
    }

    #[test]
    fn test_annealing_accepts_small_worsening_when_hot() {
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        let mut sa = SimulatedAnnealing::with_params(1e9, 1.0, 1.0);
        let current = HardSoftScore::new(0, -100);
        let hot = step(current, HardSoftScore::new(0, -101), current);

        let accepted = (0..100).filter(|_| sa.is_accepted(&hot, &mut rng)).count();
        assert!(accepted > 90);
    }

    #[test]
    fn test_tabu_with_aspiration() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut tabu = TabuSearch::new(5);
        let current = HardSoftScore::new(0, -100);
        tabu.phase_started(current);

        let first = step(current, HardSoftScore::new(0, -90), current);
        assert!(tabu.is_accepted(&first, &mut rng));
        tabu.step_ended(&first, true);

        // consumer 0 is now tabu: an improving move that does not beat the best is rejected
        let mut again = step(HardSoftScore::new(0, -90), HardSoftScore::new(0, -85), HardSoftScore::new(0, -80));
        again.iteration = 1;
        assert!(!tabu.is_accepted(&again, &mut rng));

        again.best = HardSoftScore::new(0, -90);
        assert!(tabu.is_accepted(&again, &mut rng));

        again.iteration = 5;
        again.best = HardSoftScore::new(0, -80);
        assert!(tabu.is_accepted(&again, &mut rng));
    }

    #[test]
    fn test_late_acceptance() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let mut late = LateAcceptance::new(2);
        let start = HardSoftScore::new(0, -100);
        late.phase_started(start);

        // improve to -50 at iteration 0
        let mut s = step(start, HardSoftScore::new(0, -50), start);
        assert!(late.is_accepted(&s, &mut rng));
        late.step_ended(&s, true);

        // at iteration 1 the late score is still -100, so -80 is accepted
        s = step(HardSoftScore::new(0, -50), HardSoftScore::new(0, -80), HardSoftScore::new(0, -50));
        s.iteration = 1;
        assert!(late.is_accepted(&s, &mut rng));
        late.step_ended(&s, true);

        // at iteration 2 the late score is -50, so -90 is rejected
        s = step(HardSoftScore::new(0, -80), HardSoftScore::new(0, -90), HardSoftScore::new(0, -50));
        s.iteration = 2;
        assert!(!late.is_accepted(&s, &mut rng));
    }
}
