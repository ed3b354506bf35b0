//! Solution reports.
//!
//! A [`SolutionReport`] is the id-based, serializable view of a solved
//! instance: which facility serves every consumer, the final score and the
//! totals behind it, and how full every facility is.

use crate::error::Result;
use crate::instance::FacilityLocationInstance;
use crate::score::ScoreCalculator;
use crate::solution::Solution;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRecord {
    pub consumer_id: i64,
    /// `None` if the consumer is unassigned
    pub facility_id: Option<i64>,
    pub demand: i64,
    /// Distance to the assigned facility, `None` if unassigned
    pub distance: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityUsage {
    pub facility_id: i64,
    pub used_capacity: i64,
    pub capacity: i64,
    /// Used capacity as a percentage of capacity, 0 for a zero capacity
    pub used_percentage: f64,
    pub setup_cost: i64,
    pub consumers: Vec<i64>,
}

impl FacilityUsage {
    pub fn is_used(&self) -> bool {
        !self.consumers.is_empty()
    }

    pub fn is_overloaded(&self) -> bool {
        self.used_capacity > self.capacity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolutionReport {
    pub instance_name: String,
    pub hard_score: i64,
    pub soft_score: i64,
    /// No facility is overloaded
    pub feasible: bool,
    /// Every consumer has a facility
    pub fully_assigned: bool,
    pub total_distance: i64,
    pub total_setup_cost: i64,
    pub used_facilities: usize,
    pub unassigned_consumers: usize,
    pub assignments: Vec<AssignmentRecord>,
    pub facilities: Vec<FacilityUsage>,
}

impl SolutionReport {
    /// Build a report, rescoring the solution from its assignments.
    pub fn new(instance: &FacilityLocationInstance, calculator: &ScoreCalculator, solution: &Solution) -> Self {
        let breakdown = calculator.breakdown(instance, solution);
        let score = calculator.score_from_breakdown(&breakdown);

        let assignments = instance
            .consumers
            .iter()
            .enumerate()
            .map(|(c, consumer)| {
                let facility = solution.assigned_index(c);
                AssignmentRecord {
                    consumer_id: consumer.id,
                    facility_id: facility.map(|f| instance.facilities[f].id),
                    demand: consumer.demand,
                    distance: facility.map(|f| instance.distance(c, f)),
                }
            })
            .collect();

        let mut members: Vec<Vec<i64>> = vec![Vec::new(); instance.facility_count()];
        for (c, assigned) in solution.assignments().iter().enumerate() {
            if let Some(f) = assigned {
                members[*f].push(instance.consumers[c].id);
            }
        }

        let facilities = instance
            .facilities
            .iter()
            .zip(members)
            .enumerate()
            .map(|(f, (facility, consumers))| {
                let used_capacity = solution.load(f);
                let used_percentage = if facility.capacity > 0 {
                    100.0 * used_capacity as f64 / facility.capacity as f64
                } else {
                    0.0
                };
                FacilityUsage {
                    facility_id: facility.id,
                    used_capacity,
                    capacity: facility.capacity,
                    used_percentage,
                    setup_cost: facility.setup_cost,
                    consumers,
                }
            })
            .collect();

        SolutionReport {
            instance_name: instance.name.clone(),
            hard_score: score.hard,
            soft_score: score.soft,
            feasible: score.is_feasible(),
            fully_assigned: breakdown.unassigned_consumers == 0,
            total_distance: breakdown.total_distance,
            total_setup_cost: breakdown.total_setup_cost,
            used_facilities: breakdown.used_facilities,
            unassigned_consumers: breakdown.unassigned_consumers,
            assignments,
            facilities,
        }
    }

    pub fn write_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Write one row per consumer: `consumer_id,facility_id,demand,distance`.
    pub fn write_assignments_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        for record in &self.assignments {
            writer.serialize(record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl fmt::Display for SolutionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Solution for {}", self.instance_name)?;
        writeln!(f, "  Score: {}hard/{}soft", self.hard_score, self.soft_score)?;
        writeln!(f, "  Feasible: {}", self.feasible)?;
        writeln!(
            f,
            "  Assigned consumers: {}/{}",
            self.assignments.len() - self.unassigned_consumers,
            self.assignments.len()
        )?;
        writeln!(f, "  Used facilities: {}/{}", self.used_facilities, self.facilities.len())?;
        writeln!(f, "  Total distance: {}", self.total_distance)?;
        writeln!(f, "  Total setup cost: {}", self.total_setup_cost)?;
        for usage in self.facilities.iter().filter(|u| u.is_used()) {
            writeln!(
                f,
                "  Facility {}: {}/{} ({:.1}%), {} consumers{}",
                usage.facility_id,
                usage.used_capacity,
                usage.capacity,
                usage.used_percentage,
                usage.consumers.len(),
                if usage.is_overloaded() { ", OVERLOADED" } else { "" }
            )?;
        }
        Ok(())
    }
}
