//! Local search engine for CFLP.
//!
//! One search runs a single thread over a private [`Solution`]:
//!
//! 1. draw a candidate move,
//! 2. compute its score delta,
//! 3. apply it in place,
//! 4. ask the acceptor, undoing the move if it is rejected,
//! 5. keep a copy of the solution whenever it beats the best one.
//!
//! The termination policy is consulted before every iteration, so the search
//! only ever stops between complete move cycles.

use crate::error::{Result, SolverError};
use crate::heuristics::acceptor::{Acceptor, StepScope};
use crate::heuristics::construction::{ConstructionHeuristic, GreedyConstruction};
use crate::heuristics::moves::MoveGenerator;
use crate::heuristics::termination::{SearchProgress, Termination};
use crate::instance::FacilityLocationInstance;
use crate::score::{HardSoftScore, ScoreCalculator};
use crate::solution::Solution;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
    Initializing,
    Searching,
    Terminated,
}

/// Counters of a finished search.
#[derive(Debug, Clone, Default)]
pub struct SearchStatistics {
    pub iterations: u64,
    pub accepted_moves: u64,
    pub undone_moves: u64,
    /// Number of new best solutions found
    pub improvements: u64,
    /// Iterations where no move could be drawn
    pub skipped_iterations: u64,
    /// Tracked scores corrected after a full rescore disagreed
    pub drift_corrections: u64,
    pub elapsed: Duration,
}

#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best: Solution,
    pub best_score: HardSoftScore,
    /// Iteration and score of every new best, starting with the initial solution
    pub best_trace: Vec<(u64, HardSoftScore)>,
    pub stats: SearchStatistics,
}

pub struct LocalSearch {
    pub calculator: ScoreCalculator,
    pub generator: MoveGenerator,
    acceptor: Box<dyn Acceptor>,
    termination: Box<dyn Termination>,
    construction: Box<dyn ConstructionHeuristic + Send + Sync>,
    /// Full rescore every this many iterations, 0 to disable
    pub consistency_check_interval: u64,
    pub seed: u64,
    phase: SearchPhase,
}

impl LocalSearch {
    pub fn new(
        calculator: ScoreCalculator,
        generator: MoveGenerator,
        acceptor: Box<dyn Acceptor>,
        termination: Box<dyn Termination>,
        seed: u64,
    ) -> Self {
        LocalSearch {
            calculator,
            generator,
            acceptor,
            termination,
            construction: Box::new(GreedyConstruction::new()),
            consistency_check_interval: 10_000,
            seed,
            phase: SearchPhase::Initializing,
        }
    }

    pub fn with_construction(mut self, construction: Box<dyn ConstructionHeuristic + Send + Sync>) -> Self {
        self.construction = construction;
        self
    }

    pub fn with_consistency_check(mut self, interval: u64) -> Self {
        self.consistency_check_interval = interval;
        self
    }

    pub fn phase(&self) -> SearchPhase {
        self.phase
    }

    pub fn acceptor_name(&self) -> &str {
        self.acceptor.name()
    }

    /// Build an initial solution and improve it.
    pub fn solve(&mut self, instance: &FacilityLocationInstance) -> Result<SearchResult> {
        self.phase = SearchPhase::Initializing;
        self.calculator.weights.check_bounds(instance)?;
        let solution = self.construction.construct(instance, &self.calculator)?;
        log::debug!(
            "{} construction: {} ({} unassigned)",
            self.construction.name(),
            solution.score,
            solution.unassigned_count()
        );
        self.solve_from(instance, solution)
    }

    /// Improve a caller-supplied solution. Its score is recomputed first.
    pub fn solve_from(&mut self, instance: &FacilityLocationInstance, mut current: Solution) -> Result<SearchResult> {
        self.phase = SearchPhase::Initializing;
        self.calculator.weights.check_bounds(instance)?;
        check_shape(instance, &current)?;

        if !current.is_fully_assigned() && self.calculator.weights.unassigned_penalty <= instance.max_distance() {
            log::warn!(
                "Unassigned penalty {} does not exceed the largest distance {}; consumers may stay unassigned",
                self.calculator.weights.unassigned_penalty,
                instance.max_distance()
            );
        }

        let start = Instant::now();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut stats = SearchStatistics::default();

        self.calculator.initialize(instance, &mut current);
        let mut best = current.clone();
        let mut best_trace = vec![(0, best.score)];

        self.acceptor.phase_started(current.score);
        self.termination.phase_started();
        self.phase = SearchPhase::Searching;

        log::info!(
            "Starting {} from {} ({})",
            self.acceptor.name(),
            current.score,
            self.termination.name()
        );

        let mut progress = SearchProgress::default();
        while !self.termination.is_terminated(&progress) {
            let iteration = progress.iteration;

            match self.generator.next_move(instance, &current, &mut rng) {
                Some(mv) => {
                    let delta = self.calculator.delta_of(instance, &current, &mv);
                    let previous = current.score;
                    current.do_move(instance, &mv, delta)?;

                    let step = StepScope {
                        iteration,
                        progress: self.termination.progress(&progress).unwrap_or(0.0),
                        current: previous,
                        candidate: current.score,
                        best: best.score,
                        mv: &mv,
                    };
                    let accepted = self.acceptor.is_accepted(&step, &mut rng);
                    if accepted {
                        stats.accepted_moves += 1;
                    } else {
                        current.undo_move(instance, &mv, delta)?;
                        stats.undone_moves += 1;
                    }
                    self.acceptor.step_ended(&step, accepted);
                }
                None => stats.skipped_iterations += 1,
            }

            progress.iteration += 1;
            if current.score > best.score {
                best.clone_from(&current);
                best_trace.push((progress.iteration, best.score));
                stats.improvements += 1;
                progress.unimproved = 0;
                log::info!("Iteration {}: new best {}", progress.iteration, best.score);
            } else {
                progress.unimproved += 1;
            }

            if self.consistency_check_interval > 0 && progress.iteration % self.consistency_check_interval == 0 {
                self.check_score(instance, &mut current, progress.iteration, &mut stats)?;
                log::debug!(
                    "Iteration {}: current {}, best {}, {} accepted",
                    progress.iteration,
                    current.score,
                    best.score,
                    stats.accepted_moves
                );
            }

            progress.elapsed = start.elapsed();
        }

        self.phase = SearchPhase::Terminated;
        stats.iterations = progress.iteration;
        stats.elapsed = start.elapsed();

        log::info!(
            "{} finished after {} iterations in {:.3}s: best {}",
            self.acceptor.name(),
            stats.iterations,
            stats.elapsed.as_secs_f64(),
            best.score
        );

        Ok(SearchResult {
            best_score: best.score,
            best,
            best_trace,
            stats,
        })
    }

    fn check_score(
        &self,
        instance: &FacilityLocationInstance,
        current: &mut Solution,
        iteration: u64,
        stats: &mut SearchStatistics,
    ) -> Result<()> {
        let recomputed = self.calculator.score_of(instance, current);
        if recomputed == current.score {
            return Ok(());
        }

        let drift = SolverError::ScoreDriftDetected {
            iteration,
            tracked: current.score,
            recomputed,
        };
        if cfg!(debug_assertions) {
            return Err(drift);
        }
        log::warn!("{}; resynchronising", drift);
        current.score = recomputed;
        stats.drift_corrections += 1;
        Ok(())
    }
}

/// Reject a solution that was not built for this instance.
fn check_shape(instance: &FacilityLocationInstance, solution: &Solution) -> Result<()> {
    if solution.assignments().len() != instance.consumer_count() {
        return Err(SolverError::InvalidInput(format!(
            "solution has {} consumers, instance has {}",
            solution.assignments().len(),
            instance.consumer_count()
        )));
    }
    for facility in solution.assignments().iter().flatten() {
        if *facility >= instance.facility_count() {
            return Err(SolverError::unknown_facility_index(*facility));
        }
    }
    if !solution.is_consistent(instance) {
        return Err(SolverError::InvalidInput(
            "solution loads do not match its assignments".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EntityKind;
    use crate::heuristics::acceptor::{HillClimbing, LateAcceptance, SimulatedAnnealing, TabuSearch};
    use crate::heuristics::construction::{InitialAssignment, RandomConstruction};
    use crate::heuristics::termination::{StepCountTermination, TimeTermination, UnimprovedStepTermination};
    use crate::score::ScoreWeights;
    use crate::instance::tests::two_facility_instance;
    use crate::instance::{Consumer, Facility};
    use crate::location::{DistanceMetric, Location};

    fn engine(acceptor: Box<dyn Acceptor>, iterations: u64, seed: u64) -> LocalSearch {
        LocalSearch::new(
            ScoreCalculator::default(),
            MoveGenerator::new(),
            acceptor,
            Box::new(StepCountTermination::new(iterations)),
            seed,
        )
        .with_consistency_check(1)
    }

    fn random_instance(consumers: usize, facilities: usize, seed: u64) -> FacilityLocationInstance {
        random_instance_with_capacity(consumers, facilities, 20..40, seed)
    }

    /// Demands are drawn from `1..10`.
    fn random_instance_with_capacity(
        consumers: usize,
        facilities: usize,
        capacity: std::ops::Range<i64>,
        seed: u64,
    ) -> FacilityLocationInstance {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let facilities = (0..facilities)
            .map(|i| {
                let location = Location::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)).unwrap();
                Facility::new(i as i64, location, rng.gen_range(capacity.clone()), rng.gen_range(100..500))
            })
            .collect();
        let consumers = (0..consumers)
            .map(|i| {
                let location = Location::new(rng.gen_range(0.0..100.0), rng.gen_range(0.0..100.0)).unwrap();
                Consumer::new(i as i64, location, rng.gen_range(1..10))
            })
            .collect();
        FacilityLocationInstance::new(facilities, consumers, DistanceMetric::Euclidean).unwrap()
    }

    #[test]
    fn test_two_facility_optimum() {
        let instance = two_facility_instance();
        let mut search = engine(Box::new(HillClimbing), 2_000, 42)
            .with_construction(InitialAssignment::Unassigned.heuristic(0));
        let result = search.solve(&instance).unwrap();

        assert_eq!(result.best_score, HardSoftScore::new(0, -310));
        assert_eq!(result.best.assignments(), &[Some(0), Some(0), Some(1)]);
        assert_eq!(search.phase(), SearchPhase::Terminated);
    }

    #[test]
    fn test_two_facility_optimum_from_random_starts() {
        let instance = two_facility_instance();
        for seed in 0..10 {
            let mut search = engine(Box::new(HillClimbing), 2_000, seed)
                .with_construction(Box::new(RandomConstruction::new(seed)));
            let result = search.solve(&instance).unwrap();
            assert_eq!(result.best_score, HardSoftScore::new(0, -310), "seed {}", seed);
        }
    }

    #[test]
    fn test_unavoidable_overload() {
        let location = Location::new(0.0, 0.0).unwrap();
        let instance = FacilityLocationInstance::new(
            vec![Facility::new(1, location, 5, 0)],
            vec![Consumer::new(1, location, 4), Consumer::new(2, location, 4)],
            DistanceMetric::Euclidean,
        )
        .unwrap();
        let mut search = engine(Box::new(HillClimbing), 100, 0);
        let result = search.solve(&instance).unwrap();

        assert_eq!(result.best_score.hard, -3);
        assert!(result.best.is_fully_assigned());
        assert_eq!(result.stats.skipped_iterations, 100);
    }

    #[test]
    fn test_exact_iteration_budget() {
        let instance = random_instance(30, 6, 1);
        let mut search = engine(Box::new(SimulatedAnnealing::new()), 1_234, 9);
        let result = search.solve(&instance).unwrap();

        assert_eq!(result.stats.iterations, 1_234);
        assert_eq!(
            result.stats.accepted_moves + result.stats.undone_moves + result.stats.skipped_iterations,
            1_234
        );
    }

    #[test]
    fn test_best_is_consistent_and_monotonic() {
        let instance = random_instance(40, 8, 2);
        let acceptors: Vec<Box<dyn Acceptor>> = vec![
            Box::new(HillClimbing),
            Box::new(SimulatedAnnealing::new()),
            Box::new(TabuSearch::new(5)),
            Box::new(LateAcceptance::new(50)),
        ];

        for acceptor in acceptors {
            let name = acceptor.name().to_string();
            let mut search = engine(acceptor, 3_000, 4);
            let result = search.solve(&instance).unwrap();
            let calculator = ScoreCalculator::default();

            assert_eq!(calculator.score_of(&instance, &result.best), result.best_score, "{}", name);
            assert!(result.best.is_consistent(&instance), "{}", name);
            assert!(result.best_trace.windows(2).all(|w| w[0].1 < w[1].1 && w[0].0 < w[1].0), "{}", name);
            assert_eq!(result.best_trace.last().map(|t| t.1), Some(result.best_score));
            assert_eq!(result.stats.drift_corrections, 0);
        }
    }

    #[test]
    fn test_feasible_best_has_no_overload() {
        // 30 demands below 10 total at most 270; five facilities of at least 80
        // always leave one with room, so the greedy start is feasible
        let instance = random_instance_with_capacity(30, 5, 80..100, 3);
        let mut search = engine(Box::new(LateAcceptance::new(20)), 5_000, 8);
        let result = search.solve(&instance).unwrap();

        assert!(result.best_score.is_feasible());
        assert_eq!(result.best_score.hard, 0);
        for (f, facility) in instance.facilities.iter().enumerate() {
            assert!(result.best.load(f) <= facility.capacity);
        }
    }

    #[test]
    fn test_time_limit_ends_search() {
        let instance = random_instance(40, 8, 6);
        let mut search = LocalSearch::new(
            ScoreCalculator::default(),
            MoveGenerator::new(),
            Box::new(SimulatedAnnealing::new()),
            Box::new(TimeTermination::new(Duration::from_millis(50))),
            3,
        )
        .with_consistency_check(100);
        let result = search.solve(&instance).unwrap();

        assert_eq!(search.phase(), SearchPhase::Terminated);
        assert!(result.stats.elapsed >= Duration::from_millis(50));
        assert!(result.stats.iterations > 0);
        assert!(result.best.is_consistent(&instance));
        assert_eq!(ScoreCalculator::default().score_of(&instance, &result.best), result.best_score);
    }

    #[test]
    fn test_score_drift_detected() {
        let instance = two_facility_instance();
        let search = engine(Box::new(HillClimbing), 10, 0);
        let mut current = Solution::from_assignments(&instance, &[Some(0), Some(0), Some(1)]).unwrap();
        let correct = search.calculator.initialize(&instance, &mut current);
        current.score = correct + HardSoftScore::new(0, 1);
        let mut stats = SearchStatistics::default();

        let outcome = search.check_score(&instance, &mut current, 7, &mut stats);
        if cfg!(debug_assertions) {
            match outcome {
                Err(SolverError::ScoreDriftDetected { iteration, tracked, recomputed }) => {
                    assert_eq!(iteration, 7);
                    assert_eq!(tracked, correct + HardSoftScore::new(0, 1));
                    assert_eq!(recomputed, correct);
                }
                other => panic!("expected score drift, got {:?}", other),
            }
        } else {
            assert!(outcome.is_ok());
            assert_eq!(current.score, correct);
            assert_eq!(stats.drift_corrections, 1);
        }
    }

    #[test]
    fn test_consistent_score_passes_check() {
        let instance = two_facility_instance();
        let search = engine(Box::new(HillClimbing), 10, 0);
        let mut current = Solution::from_assignments(&instance, &[Some(1), Some(0), None]).unwrap();
        search.calculator.initialize(&instance, &mut current);
        let mut stats = SearchStatistics::default();

        assert!(search.check_score(&instance, &mut current, 1, &mut stats).is_ok());
        assert_eq!(stats.drift_corrections, 0);
    }

    #[test]
    fn test_overflowing_weights_rejected_before_search() {
        let instance = two_facility_instance();
        let weights = ScoreWeights { unassigned_penalty: i64::MAX / 6, ..ScoreWeights::default() };
        let mut search = LocalSearch::new(
            ScoreCalculator::new(weights),
            MoveGenerator::new(),
            Box::new(HillClimbing),
            Box::new(StepCountTermination::new(10)),
            0,
        );

        assert!(matches!(search.solve(&instance), Err(SolverError::InvalidConfig(_))));
        assert!(matches!(
            search.solve_from(&instance, Solution::unassigned(&instance)),
            Err(SolverError::InvalidConfig(_))
        ));
    }

    /// Assigns the first consumer to a facility index past the end.
    struct OutOfRangeConstruction;

    impl ConstructionHeuristic for OutOfRangeConstruction {
        fn construct(&self, instance: &FacilityLocationInstance, calculator: &ScoreCalculator) -> Result<Solution> {
            let mut solution = Solution::unassigned(instance);
            solution.assign_index(instance, 0, Some(instance.facility_count()))?;
            calculator.initialize(instance, &mut solution);
            Ok(solution)
        }

        fn name(&self) -> &str {
            "OutOfRange"
        }
    }

    #[test]
    fn test_construction_error_aborts_solve() {
        let instance = two_facility_instance();
        let mut search = engine(Box::new(HillClimbing), 10, 0).with_construction(Box::new(OutOfRangeConstruction));

        assert!(matches!(
            search.solve(&instance),
            Err(SolverError::InvalidReference { kind: EntityKind::Facility, .. })
        ));
        assert_eq!(search.phase(), SearchPhase::Initializing);
    }

    #[test]
    fn test_same_seed_same_result() {
        let instance = random_instance(25, 5, 5);
        let a = engine(Box::new(SimulatedAnnealing::new()), 2_000, 77).solve(&instance).unwrap();
        let b = engine(Box::new(SimulatedAnnealing::new()), 2_000, 77).solve(&instance).unwrap();

        assert_eq!(a.best, b.best);
        assert_eq!(a.best_trace, b.best_trace);
    }

    #[test]
    fn test_plateau_termination() {
        let instance = two_facility_instance();
        let mut search = LocalSearch::new(
            ScoreCalculator::default(),
            MoveGenerator::new(),
            Box::new(HillClimbing),
            Box::new(UnimprovedStepTermination::new(50)),
            0,
        );
        let result = search.solve(&instance).unwrap();

        let last_improvement = result.best_trace.last().map(|t| t.0).unwrap_or(0);
        assert_eq!(result.stats.iterations, last_improvement + 50);
    }

    #[test]
    fn test_warm_start_keeps_better_score() {
        let instance = two_facility_instance();
        let start = Solution::from_assignments(&instance, &[Some(0), Some(0), Some(1)]).unwrap();
        let mut search = engine(Box::new(HillClimbing), 200, 1);
        let result = search.solve_from(&instance, start.clone()).unwrap();

        assert_eq!(result.best.assignments(), start.assignments());
        assert_eq!(result.stats.improvements, 0);
    }

    #[test]
    fn test_foreign_solution_rejected() {
        let instance = two_facility_instance();
        let location = Location::new(0.0, 0.0).unwrap();
        let small = FacilityLocationInstance::new(
            vec![Facility::new(1, location, 10, 0)],
            vec![
                Consumer::new(1, location, 1),
                Consumer::new(2, location, 1),
                Consumer::new(3, location, 1),
            ],
            DistanceMetric::Euclidean,
        )
        .unwrap();
        let foreign = Solution::from_assignments(&instance, &[Some(1), Some(1), Some(1)]).unwrap();

        let mut search = engine(Box::new(HillClimbing), 10, 0);
        assert!(matches!(
            search.solve_from(&small, foreign),
            Err(SolverError::InvalidReference { kind: EntityKind::Facility, .. })
        ));
    }
}
