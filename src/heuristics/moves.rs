//! Random move generation.
//!
//! Moves are sampled uniformly: a random consumer and a random facility other
//! than its current one for a reassign, a random pair of consumers on
//! different facilities for a swap. Every reassign has a positive probability
//! on every call, so no assignment reachable through reassigns is ever
//! excluded.

use crate::instance::FacilityLocationInstance;
use crate::solution::{Move, Solution};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct MoveGenerator {
    /// Probability of trying a swap before falling back to a reassign
    pub swap_probability: f64,
    /// Pair draws per swap attempt
    pub swap_attempts: usize,
}

impl MoveGenerator {
    pub fn new() -> Self {
        MoveGenerator {
            swap_probability: 0.2,
            swap_attempts: 8,
        }
    }

    pub fn with_params(swap_probability: f64, swap_attempts: usize) -> Self {
        MoveGenerator {
            swap_probability: swap_probability.clamp(0.0, 1.0),
            swap_attempts,
        }
    }

    /// Reassigns only.
    pub fn reassign_only() -> Self {
        Self::with_params(0.0, 0)
    }

    /// Draw the next candidate move for the current solution, or `None` if
    /// the draw found nothing to change.
    pub fn next_move(
        &self,
        instance: &FacilityLocationInstance,
        solution: &Solution,
        rng: &mut ChaCha8Rng,
    ) -> Option<Move> {
        if instance.consumer_count() == 0 || instance.facility_count() == 0 {
            return None;
        }

        if self.swap_probability > 0.0 && rng.gen_bool(self.swap_probability) {
            if let Some(mv) = self.swap_move(instance, solution, rng) {
                return Some(mv);
            }
        }
        self.reassign_move(instance, solution, rng)
    }

    fn reassign_move(
        &self,
        instance: &FacilityLocationInstance,
        solution: &Solution,
        rng: &mut ChaCha8Rng,
    ) -> Option<Move> {
        let facilities = instance.facility_count();
        let consumer = rng.gen_range(0..instance.consumer_count());
        let from = solution.assigned_index(consumer);

        let to = match from {
            Some(current) => {
                if facilities < 2 {
                    return None;
                }
                // uniform over every facility except the current one
                let pick = rng.gen_range(0..facilities - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            None => rng.gen_range(0..facilities),
        };

        Some(Move::Reassign { consumer, from, to: Some(to) })
    }

    fn swap_move(
        &self,
        instance: &FacilityLocationInstance,
        solution: &Solution,
        rng: &mut ChaCha8Rng,
    ) -> Option<Move> {
        let consumers = instance.consumer_count();
        if consumers < 2 || instance.facility_count() < 2 {
            return None;
        }

        for _ in 0..self.swap_attempts {
            let first = rng.gen_range(0..consumers);
            let mut second = rng.gen_range(0..consumers - 1);
            if second >= first {
                second += 1;
            }

            if let (Some(first_from), Some(second_from)) =
                (solution.assigned_index(first), solution.assigned_index(second))
            {
                if first_from != second_from {
                    return Some(Move::Swap { first, second, first_from, second_from });
                }
            }
        }
        None
    }
}

impl Default for MoveGenerator {
    fn default() -> Self {
        Self::new()
    }
}
