//! Independent restarts in parallel.
//!
//! Every run builds its own engine from the shared configuration with the seed
//! `config.seed + run`, so the set of results only depends on the seed and the
//! run count, never on thread scheduling.

use crate::config::SolverConfig;
use crate::error::{Result, SolverError};
use crate::heuristics::local_search::SearchResult;
use crate::instance::FacilityLocationInstance;
use crate::score::HardSoftScore;
use rayon::prelude::*;

pub struct MultiStartSolver {
    pub config: SolverConfig,
    pub runs: usize,
}

#[derive(Debug, Clone)]
pub struct MultiStartResult {
    /// Result of the winning run
    pub best: SearchResult,
    pub best_run: usize,
    /// Best score of every run, by run index
    pub run_scores: Vec<HardSoftScore>,
}

impl MultiStartSolver {
    pub fn new(config: SolverConfig, runs: usize) -> Self {
        MultiStartSolver { config, runs }
    }

    pub fn solve(&self, instance: &FacilityLocationInstance) -> Result<MultiStartResult> {
        self.solve_with_progress(instance, |_| {})
    }

    /// Solve and call `on_run_finished` as each run completes, from the
    /// worker thread that ran it.
    pub fn solve_with_progress<F>(&self, instance: &FacilityLocationInstance, on_run_finished: F) -> Result<MultiStartResult>
    where
        F: Fn(&SearchResult) + Sync,
    {
        if self.runs == 0 {
            return Err(SolverError::InvalidConfig("at least one run is required".to_string()));
        }
        self.config.validate()?;

        log::info!("Starting {} independent runs on {} threads", self.runs, rayon::current_num_threads());

        let results: Vec<SearchResult> = (0..self.runs)
            .into_par_iter()
            .map(|run| -> Result<SearchResult> {
                let mut config = self.config.clone();
                config.seed = self.config.seed.wrapping_add(run as u64);
                let result = config.build_engine()?.solve(instance)?;
                log::debug!("Run {} (seed {}): {}", run, config.seed, result.best_score);
                on_run_finished(&result);
                Ok(result)
            })
            .collect::<Result<Vec<_>>>()?;

        let run_scores: Vec<HardSoftScore> = results.iter().map(|r| r.best_score).collect();

        // highest score wins, the lowest run index breaks ties
        let mut best_run = 0;
        for (run, score) in run_scores.iter().enumerate() {
            if *score > run_scores[best_run] {
                best_run = run;
            }
        }

        let best = results
            .into_iter()
            .nth(best_run)
            .ok_or_else(|| SolverError::InvalidConfig("no run produced a result".to_string()))?;

        log::info!("Best of {} runs: run {} with {}", self.runs, best_run, best.best_score);

        Ok(MultiStartResult { best, best_run, run_scores })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AcceptorConfig, TerminationConfig};
    use crate::instance::tests::two_facility_instance;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(iterations: u64) -> SolverConfig {
        SolverConfig {
            termination: TerminationConfig {
                max_iterations: Some(iterations),
                ..TerminationConfig::default()
            },
            acceptor: AcceptorConfig::HillClimbing,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn test_best_of_runs() {
        let instance = two_facility_instance();
        let solver = MultiStartSolver::new(config(2_000), 4);
        let finished = AtomicUsize::new(0);
        let result = solver
            .solve_with_progress(&instance, |_| {
                finished.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert_eq!(finished.load(Ordering::SeqCst), 4);
        assert_eq!(result.run_scores.len(), 4);
        assert_eq!(result.best.best_score, HardSoftScore::new(0, -310));
        assert!(result.run_scores.iter().all(|s| *s <= result.best.best_score));
        assert_eq!(result.run_scores[result.best_run], result.best.best_score);
    }

    #[test]
    fn test_runs_are_reproducible() {
        let instance = two_facility_instance();
        let mut cfg = config(300);
        cfg.initial_assignment = crate::heuristics::construction::InitialAssignment::Random;
        let a = MultiStartSolver::new(cfg.clone(), 3).solve(&instance).unwrap();
        let b = MultiStartSolver::new(cfg, 3).solve(&instance).unwrap();

        assert_eq!(a.run_scores, b.run_scores);
        assert_eq!(a.best_run, b.best_run);
        assert_eq!(a.best.best, b.best.best);
    }

    #[test]
    fn test_zero_runs_rejected() {
        let instance = two_facility_instance();
        assert!(matches!(
            MultiStartSolver::new(config(10), 0).solve(&instance),
            Err(SolverError::InvalidConfig(_))
        ));
    }
}
