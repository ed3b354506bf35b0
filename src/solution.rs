//! Solution representation and manipulation for CFLP.
//!
//! A [`Solution`] is the mutable half of the problem: which facility every
//! consumer is assigned to, plus the per-facility load and consumer count and
//! the running score, all maintained incrementally. The search only ever
//! changes it through [`Move`]s, which are exactly reversible.

use crate::error::{EntityKind, Result, SolverError};
use crate::instance::FacilityLocationInstance;
use crate::score::HardSoftScore;

/// Record of a single assignment change, enough to revert it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    pub consumer: usize,
    pub previous: Option<usize>,
    pub current: Option<usize>,
    /// Demand that moved between the two facilities
    pub demand: i64,
}

/// Represents a move in local search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    /// Move one consumer from its facility (or none) to another facility (or none).
    Reassign {
        consumer: usize,
        from: Option<usize>,
        to: Option<usize>,
    },
    /// Exchange the facilities of two consumers assigned to different facilities.
    Swap {
        first: usize,
        second: usize,
        first_from: usize,
        second_from: usize,
    },
}

impl Move {
    /// The move that reverts this one.
    pub fn undo_move(&self) -> Move {
        match *self {
            Move::Reassign { consumer, from, to } => Move::Reassign { consumer, from: to, to: from },
            Move::Swap { first, second, first_from, second_from } => Move::Swap {
                first,
                second,
                first_from: second_from,
                second_from: first_from,
            },
        }
    }

    /// Consumers whose assignment the move changes.
    pub fn consumers(&self) -> (usize, Option<usize>) {
        match *self {
            Move::Reassign { consumer, .. } => (consumer, None),
            Move::Swap { first, second, .. } => (first, Some(second)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Move::Reassign { .. } => "Reassign",
            Move::Swap { .. } => "Swap",
        }
    }
}

/// Represents a (possibly partial) assignment of consumers to facilities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    /// Facility index per consumer index
    assignments: Vec<Option<usize>>,
    /// Sum of assigned demand per facility
    loads: Vec<i64>,
    /// Number of assigned consumers per facility
    counts: Vec<usize>,
    unassigned: usize,
    /// Running score, kept in sync by `do_move` and `undo_move`
    pub score: HardSoftScore,
}

impl Solution {
    /// A solution with every consumer unassigned and all loads at zero.
    ///
    /// The score is left at zero; initialize it with
    /// [`ScoreCalculator::initialize`](crate::score::ScoreCalculator::initialize).
    pub fn unassigned(instance: &FacilityLocationInstance) -> Self {
        Solution {
            assignments: vec![None; instance.consumer_count()],
            loads: vec![0; instance.facility_count()],
            counts: vec![0; instance.facility_count()],
            unassigned: instance.consumer_count(),
            score: HardSoftScore::ZERO,
        }
    }

    /// Build a solution from a facility index per consumer index.
    pub fn from_assignments(instance: &FacilityLocationInstance, assignments: &[Option<usize>]) -> Result<Self> {
        if assignments.len() != instance.consumer_count() {
            return Err(SolverError::InvalidInput(format!(
                "expected {} assignments, got {}",
                instance.consumer_count(),
                assignments.len()
            )));
        }
        let mut solution = Self::unassigned(instance);
        for (consumer, facility) in assignments.iter().enumerate() {
            solution.assign_index(instance, consumer, *facility)?;
        }
        Ok(solution)
    }

    #[inline]
    pub fn assignments(&self) -> &[Option<usize>] {
        &self.assignments
    }

    /// Facility index the consumer at `consumer` is assigned to.
    #[inline]
    pub fn assigned_index(&self, consumer: usize) -> Option<usize> {
        self.assignments[consumer]
    }

    #[inline]
    pub fn load(&self, facility: usize) -> i64 {
        self.loads[facility]
    }

    #[inline]
    pub fn count(&self, facility: usize) -> usize {
        self.counts[facility]
    }

    pub fn unassigned_count(&self) -> usize {
        self.unassigned
    }

    pub fn is_fully_assigned(&self) -> bool {
        self.unassigned == 0
    }

    /// Current load of the facility with the given id.
    pub fn load_of(&self, instance: &FacilityLocationInstance, facility_id: i64) -> Result<i64> {
        Ok(self.loads[instance.facility_index_of(facility_id)?])
    }

    /// Whether at least one consumer is assigned to the facility.
    pub fn is_used(&self, instance: &FacilityLocationInstance, facility_id: i64) -> Result<bool> {
        Ok(self.counts[instance.facility_index_of(facility_id)?] > 0)
    }

    pub fn demand_of(&self, instance: &FacilityLocationInstance, consumer_id: i64) -> Result<i64> {
        Ok(instance.demand(instance.consumer_index_of(consumer_id)?))
    }

    /// Id of the facility the consumer is assigned to, if any.
    pub fn assigned_facility(&self, instance: &FacilityLocationInstance, consumer_id: i64) -> Result<Option<i64>> {
        let consumer = instance.consumer_index_of(consumer_id)?;
        Ok(self.assignments[consumer].map(|f| instance.facilities[f].id))
    }

    /// Ids of the consumers assigned to a facility, in consumer order.
    pub fn assigned_consumers(&self, instance: &FacilityLocationInstance, facility_id: i64) -> Result<Vec<i64>> {
        let facility = instance.facility_index_of(facility_id)?;
        Ok(self
            .assignments
            .iter()
            .enumerate()
            .filter(|(_, assigned)| **assigned == Some(facility))
            .map(|(consumer, _)| instance.consumers[consumer].id)
            .collect())
    }

    /// Assign a consumer to a facility (or unassign it), by id.
    ///
    /// Updates the loads and counts of both facilities. The score is not
    /// touched; re-initialize it afterwards or go through [`Solution::do_move`].
    pub fn assign(
        &mut self,
        instance: &FacilityLocationInstance,
        consumer_id: i64,
        facility_id: Option<i64>,
    ) -> Result<AppliedChange> {
        let consumer = instance.consumer_index_of(consumer_id)?;
        let facility = facility_id.map(|id| instance.facility_index_of(id)).transpose()?;
        self.assign_index(instance, consumer, facility)
    }

    /// Assign a consumer to a facility (or unassign it), by index.
    pub fn assign_index(
        &mut self,
        instance: &FacilityLocationInstance,
        consumer: usize,
        facility: Option<usize>,
    ) -> Result<AppliedChange> {
        if consumer >= self.assignments.len() {
            return Err(SolverError::unknown_consumer_index(consumer));
        }
        if let Some(f) = facility {
            if f >= self.loads.len() {
                return Err(SolverError::unknown_facility_index(f));
            }
        }

        let change = AppliedChange {
            consumer,
            previous: self.assignments[consumer],
            current: facility,
            demand: instance.demand(consumer),
        };
        self.set(change.consumer, change.previous, change.current, change.demand);
        Ok(change)
    }

    /// Revert a change previously returned by `assign` or `assign_index`.
    pub fn revert(&mut self, change: &AppliedChange) {
        debug_assert_eq!(self.assignments[change.consumer], change.current);
        self.set(change.consumer, change.current, change.previous, change.demand);
    }

    #[inline]
    fn set(&mut self, consumer: usize, from: Option<usize>, to: Option<usize>, demand: i64) {
        if from == to {
            return;
        }
        match from {
            Some(f) => {
                self.loads[f] -= demand;
                self.counts[f] -= 1;
            }
            None => self.unassigned -= 1,
        }
        match to {
            Some(f) => {
                self.loads[f] += demand;
                self.counts[f] += 1;
            }
            None => self.unassigned += 1,
        }
        self.assignments[consumer] = to;
    }

    fn check_facility(&self, facility: usize) -> Result<()> {
        if facility >= self.loads.len() {
            return Err(SolverError::unknown_facility_index(facility));
        }
        Ok(())
    }

    fn check_assigned(&self, consumer: usize, expected: Option<usize>) -> Result<()> {
        let actual = *self
            .assignments
            .get(consumer)
            .ok_or_else(|| SolverError::unknown_consumer_index(consumer))?;
        if actual != expected {
            return Err(SolverError::InvalidReference {
                kind: EntityKind::Consumer,
                detail: format!(
                    "consumer at index {} is assigned to {:?}, move expected {:?}",
                    consumer, actual, expected
                ),
            });
        }
        Ok(())
    }

    /// Apply a move and add its precomputed delta to the running score.
    ///
    /// Fails without touching the solution if the move references an unknown
    /// index or does not match the current assignment.
    pub fn do_move(&mut self, instance: &FacilityLocationInstance, mv: &Move, delta: HardSoftScore) -> Result<()> {
        match *mv {
            Move::Reassign { consumer, from, to } => {
                self.check_assigned(consumer, from)?;
                if let Some(f) = to {
                    self.check_facility(f)?;
                }
                self.set(consumer, from, to, instance.demand(consumer));
            }
            Move::Swap { first, second, first_from, second_from } => {
                self.check_assigned(first, Some(first_from))?;
                self.check_assigned(second, Some(second_from))?;
                if first == second {
                    return Err(SolverError::InvalidReference {
                        kind: EntityKind::Consumer,
                        detail: format!("swap of consumer at index {} with itself", first),
                    });
                }
                self.set(first, Some(first_from), Some(second_from), instance.demand(first));
                self.set(second, Some(second_from), Some(first_from), instance.demand(second));
            }
        }
        self.score += delta;
        Ok(())
    }

    /// Revert a move applied with [`Solution::do_move`] and the same delta.
    pub fn undo_move(&mut self, instance: &FacilityLocationInstance, mv: &Move, delta: HardSoftScore) -> Result<()> {
        self.do_move(instance, &mv.undo_move(), -delta)
    }

    /// Check that loads, counts and the unassigned counter match the assignment vector.
    pub fn is_consistent(&self, instance: &FacilityLocationInstance) -> bool {
        let mut loads = vec![0i64; self.loads.len()];
        let mut counts = vec![0usize; self.counts.len()];
        let mut unassigned = 0;
        for (consumer, assigned) in self.assignments.iter().enumerate() {
            match *assigned {
                Some(f) => {
                    loads[f] += instance.demand(consumer);
                    counts[f] += 1;
                }
                None => unassigned += 1,
            }
        }
        loads == self.loads && counts == self.counts && unassigned == self.unassigned
    }
}
