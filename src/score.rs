//! Two-tiered scoring for CFLP solutions.
//!
//! The score has one hard term and two soft terms:
//!
//! - hard: `-hard_weight * sum(max(0, load - capacity))` over all facilities,
//! - soft: `-distance_weight * sum(distance)` over all consumers, where an
//!   unassigned consumer counts `unassigned_penalty` as its distance,
//! - soft: `-setup_weight * sum(setup_cost)` over used facilities.
//!
//! [`ScoreCalculator::score_of`] recomputes everything from the assignment
//! vector. [`ScoreCalculator::delta_of`] computes the change a move would cause
//! in O(1) from the maintained loads and counts of the facilities it touches.
//! All arithmetic is integer, so the two always agree exactly.

use crate::error::{Result, SolverError};
use crate::instance::FacilityLocationInstance;
use crate::solution::{Move, Solution};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// A hard/soft score pair, compared lexicographically (hard first).
///
/// Both levels are non-positive for a scored solution; zero hard means
/// feasible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct HardSoftScore {
    pub hard: i64,
    pub soft: i64,
}

impl HardSoftScore {
    pub const ZERO: HardSoftScore = HardSoftScore { hard: 0, soft: 0 };

    #[inline]
    pub const fn new(hard: i64, soft: i64) -> Self {
        HardSoftScore { hard, soft }
    }

    /// No hard constraint is broken.
    #[inline]
    pub fn is_feasible(&self) -> bool {
        self.hard >= 0
    }
}

impl Add for HardSoftScore {
    type Output = HardSoftScore;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        HardSoftScore::new(self.hard + rhs.hard, self.soft + rhs.soft)
    }
}

impl Sub for HardSoftScore {
    type Output = HardSoftScore;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        HardSoftScore::new(self.hard - rhs.hard, self.soft - rhs.soft)
    }
}

impl Neg for HardSoftScore {
    type Output = HardSoftScore;

    #[inline]
    fn neg(self) -> Self::Output {
        HardSoftScore::new(-self.hard, -self.soft)
    }
}

impl AddAssign for HardSoftScore {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.hard += rhs.hard;
        self.soft += rhs.soft;
    }
}

impl SubAssign for HardSoftScore {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.hard -= rhs.hard;
        self.soft -= rhs.soft;
    }
}

impl fmt::Display for HardSoftScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}hard/{}soft", self.hard, self.soft)
    }
}

/// Coefficients of the score terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    /// Weight of the total consumer to facility distance
    pub distance_weight: i64,
    /// Weight of the total setup cost of used facilities
    pub setup_weight: i64,
    /// Weight of the total capacity overload
    pub hard_weight: i64,
    /// Distance charged for a consumer without a facility
    pub unassigned_penalty: i64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            distance_weight: 5,
            setup_weight: 2,
            hard_weight: 1,
            unassigned_penalty: 100_000_000,
        }
    }
}

impl ScoreWeights {
    pub fn validate(&self) -> Result<()> {
        if self.distance_weight < 0 || self.setup_weight < 0 || self.unassigned_penalty < 0 {
            return Err(SolverError::InvalidConfig(format!("score weights must be non-negative: {:?}", self)));
        }
        if self.hard_weight <= 0 {
            return Err(SolverError::InvalidConfig(format!(
                "hard weight must be positive, got {}",
                self.hard_weight
            )));
        }
        if self.distance_weight.checked_mul(self.unassigned_penalty).is_none() {
            return Err(SolverError::InvalidConfig(format!(
                "distance weight {} times unassigned penalty {} overflows",
                self.distance_weight, self.unassigned_penalty
            )));
        }
        Ok(())
    }

    /// Check that no solution of `instance` can overflow the score.
    ///
    /// The soft level is bounded by every consumer at the larger of the
    /// unassigned penalty and the largest distance plus every facility used;
    /// the hard level by the whole demand landing on overloaded facilities.
    pub fn check_bounds(&self, instance: &FacilityLocationInstance) -> Result<()> {
        self.validate()?;
        let overflow = || {
            SolverError::InvalidConfig(format!(
                "score weights {:?} can overflow on instance {:?} ({} consumers, {} facilities)",
                self,
                instance.name,
                instance.consumer_count(),
                instance.facility_count()
            ))
        };

        let worst_distance = self.unassigned_penalty.max(instance.max_distance());
        let total_demand = instance
            .consumers
            .iter()
            .try_fold(0i64, |sum, c| sum.checked_add(c.demand))
            .ok_or_else(overflow)?;
        let total_setup = instance
            .facilities
            .iter()
            .try_fold(0i64, |sum, f| sum.checked_add(f.setup_cost))
            .ok_or_else(overflow)?;

        let soft = i64::try_from(instance.consumer_count())
            .ok()
            .and_then(|n| n.checked_mul(worst_distance))
            .and_then(|d| d.checked_mul(self.distance_weight))
            .and_then(|d| self.setup_weight.checked_mul(total_setup).and_then(|s| d.checked_add(s)));
        let hard = self.hard_weight.checked_mul(total_demand);

        match (soft, hard) {
            (Some(_), Some(_)) => Ok(()),
            _ => Err(overflow()),
        }
    }
}

/// Raw totals behind a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    /// Sum of demand above capacity over all facilities
    pub total_overload: i64,
    /// Sum of real distances of assigned consumers
    pub total_distance: i64,
    /// Sum of setup costs of used facilities
    pub total_setup_cost: i64,
    pub used_facilities: usize,
    pub unassigned_consumers: usize,
}

/// Full and incremental score computation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreCalculator {
    pub weights: ScoreWeights,
}

impl ScoreCalculator {
    pub fn new(weights: ScoreWeights) -> Self {
        ScoreCalculator { weights }
    }

    /// Recompute the raw totals from the assignment vector alone.
    pub fn breakdown(&self, instance: &FacilityLocationInstance, solution: &Solution) -> ScoreBreakdown {
        let mut loads = vec![0i64; instance.facility_count()];
        let mut counts = vec![0usize; instance.facility_count()];
        let mut breakdown = ScoreBreakdown::default();

        for (consumer, assigned) in solution.assignments().iter().enumerate() {
            match *assigned {
                Some(facility) => {
                    loads[facility] += instance.demand(consumer);
                    counts[facility] += 1;
                    breakdown.total_distance += instance.distance(consumer, facility);
                }
                None => breakdown.unassigned_consumers += 1,
            }
        }

        for (facility, data) in instance.facilities.iter().enumerate() {
            breakdown.total_overload += overload(loads[facility], data.capacity);
            if counts[facility] > 0 {
                breakdown.total_setup_cost += data.setup_cost;
                breakdown.used_facilities += 1;
            }
        }

        breakdown
    }

    /// Score a solution from scratch. O(consumers + facilities).
    pub fn score_of(&self, instance: &FacilityLocationInstance, solution: &Solution) -> HardSoftScore {
        self.score_from_breakdown(&self.breakdown(instance, solution))
    }

    pub fn score_from_breakdown(&self, breakdown: &ScoreBreakdown) -> HardSoftScore {
        let w = &self.weights;
        let distance = breakdown.total_distance + breakdown.unassigned_consumers as i64 * w.unassigned_penalty;
        HardSoftScore::new(
            -w.hard_weight * breakdown.total_overload,
            -(w.distance_weight * distance + w.setup_weight * breakdown.total_setup_cost),
        )
    }

    /// Recompute and store the score of a solution.
    pub fn initialize(&self, instance: &FacilityLocationInstance, solution: &mut Solution) -> HardSoftScore {
        let score = self.score_of(instance, solution);
        solution.score = score;
        score
    }

    /// Score change caused by applying `mv` to `solution`. O(1).
    ///
    /// The move must have been generated from the current state of the
    /// solution; the result is meaningless for a stale move.
    pub fn delta_of(&self, instance: &FacilityLocationInstance, solution: &Solution, mv: &Move) -> HardSoftScore {
        match *mv {
            Move::Reassign { consumer, from, to } => self.reassign_delta(instance, solution, consumer, from, to),
            Move::Swap { first, second, first_from, second_from } => {
                self.swap_delta(instance, solution, first, second, first_from, second_from)
            }
        }
    }

    #[inline]
    fn distance_term(&self, instance: &FacilityLocationInstance, consumer: usize, facility: Option<usize>) -> i64 {
        match facility {
            Some(f) => instance.distance(consumer, f),
            None => self.weights.unassigned_penalty,
        }
    }

    fn reassign_delta(
        &self,
        instance: &FacilityLocationInstance,
        solution: &Solution,
        consumer: usize,
        from: Option<usize>,
        to: Option<usize>,
    ) -> HardSoftScore {
        if from == to {
            return HardSoftScore::ZERO;
        }

        let w = &self.weights;
        let demand = instance.demand(consumer);
        let mut overload_change = 0;
        let mut setup_change = 0;

        if let Some(a) = from {
            let capacity = instance.facilities[a].capacity;
            let load = solution.load(a);
            overload_change += overload(load - demand, capacity) - overload(load, capacity);
            if solution.count(a) == 1 {
                setup_change -= instance.facilities[a].setup_cost;
            }
        }
        if let Some(b) = to {
            let capacity = instance.facilities[b].capacity;
            let load = solution.load(b);
            overload_change += overload(load + demand, capacity) - overload(load, capacity);
            if solution.count(b) == 0 {
                setup_change += instance.facilities[b].setup_cost;
            }
        }

        let distance_change =
            self.distance_term(instance, consumer, to) - self.distance_term(instance, consumer, from);

        HardSoftScore::new(
            -w.hard_weight * overload_change,
            -(w.distance_weight * distance_change + w.setup_weight * setup_change),
        )
    }

    fn swap_delta(
        &self,
        instance: &FacilityLocationInstance,
        solution: &Solution,
        first: usize,
        second: usize,
        a: usize,
        b: usize,
    ) -> HardSoftScore {
        if a == b || first == second {
            return HardSoftScore::ZERO;
        }

        let w = &self.weights;
        let shift = instance.demand(second) - instance.demand(first);

        let (cap_a, load_a) = (instance.facilities[a].capacity, solution.load(a));
        let (cap_b, load_b) = (instance.facilities[b].capacity, solution.load(b));
        let overload_change = overload(load_a + shift, cap_a) - overload(load_a, cap_a)
            + overload(load_b - shift, cap_b)
            - overload(load_b, cap_b);

        let distance_change = instance.distance(first, b) + instance.distance(second, a)
            - instance.distance(first, a)
            - instance.distance(second, b);

        HardSoftScore::new(-w.hard_weight * overload_change, -w.distance_weight * distance_change)
    }
}

#[inline]
fn overload(load: i64, capacity: i64) -> i64 {
    (load - capacity).max(0)
}
