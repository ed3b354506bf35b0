//! Construction heuristics for the initial assignment.

use crate::error::Result;
use crate::instance::FacilityLocationInstance;
use crate::score::ScoreCalculator;
use crate::solution::{Move, Solution};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Builds the starting solution of a search. The returned solution has its
/// score initialized.
pub trait ConstructionHeuristic {
    fn construct(&self, instance: &FacilityLocationInstance, calculator: &ScoreCalculator) -> Result<Solution>;
    fn name(&self) -> &str;
}

/// How the engine builds its starting solution
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialAssignment {
    /// Every consumer starts without a facility
    Unassigned,
    /// First-fit-decreasing on demand, best delta score per consumer
    #[default]
    Greedy,
    /// Uniform random facility per consumer
    Random,
}

impl InitialAssignment {
    pub fn heuristic(&self, seed: u64) -> Box<dyn ConstructionHeuristic + Send + Sync> {
        match self {
            InitialAssignment::Unassigned => Box::new(UnassignedConstruction),
            InitialAssignment::Greedy => Box::new(GreedyConstruction::new()),
            InitialAssignment::Random => Box::new(RandomConstruction::new(seed)),
        }
    }
}

/// Leaves every consumer unassigned.
pub struct UnassignedConstruction;

impl ConstructionHeuristic for UnassignedConstruction {
    fn construct(&self, instance: &FacilityLocationInstance, calculator: &ScoreCalculator) -> Result<Solution> {
        let mut solution = Solution::unassigned(instance);
        calculator.initialize(instance, &mut solution);
        Ok(solution)
    }

    fn name(&self) -> &str {
        "Unassigned"
    }
}

/// First-fit-decreasing construction
///
/// Visits consumers by decreasing demand and assigns each one to the facility
/// whose assignment yields the best score delta given everything assigned so
/// far. Overloading is only chosen when every facility would overload.
pub struct GreedyConstruction {
    /// Visit consumers by decreasing demand instead of input order
    pub decreasing_demand: bool,
}

impl GreedyConstruction {
    pub fn new() -> Self {
        GreedyConstruction { decreasing_demand: true }
    }

    pub fn in_input_order() -> Self {
        GreedyConstruction { decreasing_demand: false }
    }
}

impl Default for GreedyConstruction {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstructionHeuristic for GreedyConstruction {
    fn construct(&self, instance: &FacilityLocationInstance, calculator: &ScoreCalculator) -> Result<Solution> {
        let mut solution = Solution::unassigned(instance);
        calculator.initialize(instance, &mut solution);
        if instance.facility_count() == 0 {
            return Ok(solution);
        }

        let mut order: Vec<usize> = (0..instance.consumer_count()).collect();
        if self.decreasing_demand {
            // stable, ties keep input order
            order.sort_by_key(|&c| std::cmp::Reverse(instance.demand(c)));
        }

        for consumer in order {
            let best = (0..instance.facility_count())
                .map(|facility| {
                    let mv = Move::Reassign { consumer, from: None, to: Some(facility) };
                    (mv, calculator.delta_of(instance, &solution, &mv))
                })
                .fold(None, |best: Option<(Move, _)>, (mv, delta)| match best {
                    Some((_, best_delta)) if best_delta >= delta => best,
                    _ => Some((mv, delta)),
                });

            if let Some((mv, delta)) = best {
                solution.do_move(instance, &mv, delta)?;
            }
        }

        log::debug!("Greedy construction score: {}", solution.score);
        Ok(solution)
    }

    fn name(&self) -> &str {
        if self.decreasing_demand {
            "FirstFitDecreasing"
        } else {
            "FirstFit"
        }
    }
}

/// Assigns every consumer to a uniformly random facility.
pub struct RandomConstruction {
    pub seed: u64,
}

impl RandomConstruction {
    pub fn new(seed: u64) -> Self {
        RandomConstruction { seed }
    }
}

impl ConstructionHeuristic for RandomConstruction {
    fn construct(&self, instance: &FacilityLocationInstance, calculator: &ScoreCalculator) -> Result<Solution> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut solution = Solution::unassigned(instance);

        if instance.facility_count() > 0 {
            for consumer in 0..instance.consumer_count() {
                let facility = rng.gen_range(0..instance.facility_count());
                solution.assign_index(instance, consumer, Some(facility))?;
            }
        }

        calculator.initialize(instance, &mut solution);
        Ok(solution)
    }

    fn name(&self) -> &str {
        "Random"
    }
}
