//! Module for representing CFLP instances.
//!
//! An instance is the immutable part of the problem: the facilities, the
//! consumers and the distance metric between them. It is validated once on
//! construction and precomputes the consumer x facility distance matrix used
//! by the scoring hot path.

use crate::error::{EntityKind, Result, SolverError};
use crate::location::{DistanceMetric, Location};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use rayon::prelude::*;

/// A facility that consumers can be assigned to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    /// Facility identifier, unique among facilities
    pub id: i64,
    pub location: Location,
    /// Maximum total demand the facility can serve
    pub capacity: i64,
    /// Cost charged once if at least one consumer is assigned
    pub setup_cost: i64,
}

impl Facility {
    pub fn new(id: i64, location: Location, capacity: i64, setup_cost: i64) -> Self {
        Facility { id, location, capacity, setup_cost }
    }
}

/// A consumer with a demand that must be served by exactly one facility
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    /// Consumer identifier, unique among consumers
    pub id: i64,
    pub location: Location,
    pub demand: i64,
}

impl Consumer {
    pub fn new(id: i64, location: Location, demand: i64) -> Self {
        Consumer { id, location, demand }
    }
}

/// Serialized form of a problem instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblemInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub metric: DistanceMetric,
    pub facilities: Vec<Facility>,
    pub consumers: Vec<Consumer>,
}

impl ProblemInput {
    /// Validate the input and build an instance from it.
    pub fn build(self) -> Result<FacilityLocationInstance> {
        let mut instance = FacilityLocationInstance::new(self.facilities, self.consumers, self.metric)?;
        instance.name = self.name;
        Ok(instance)
    }
}

/// A validated, immutable CFLP instance
#[derive(Debug, Clone)]
pub struct FacilityLocationInstance {
    /// Name of the instance
    pub name: String,
    pub metric: DistanceMetric,
    pub facilities: Vec<Facility>,
    pub consumers: Vec<Consumer>,
    /// Row-major consumer x facility distances
    distances: Vec<i64>,
    facility_index: HashMap<i64, usize>,
    consumer_index: HashMap<i64, usize>,
}

impl FacilityLocationInstance {
    /// Build an instance, validating ids, numeric fields and locations.
    pub fn new(facilities: Vec<Facility>, consumers: Vec<Consumer>, metric: DistanceMetric) -> Result<Self> {
        let mut facility_index = HashMap::with_capacity(facilities.len());
        for (index, facility) in facilities.iter().enumerate() {
            if facility_index.insert(facility.id, index).is_some() {
                return Err(SolverError::InvalidInput(format!("duplicate facility id {}", facility.id)));
            }
            if facility.capacity < 0 {
                return Err(SolverError::InvalidInput(format!(
                    "facility {} has negative capacity {}",
                    facility.id, facility.capacity
                )));
            }
            if facility.setup_cost < 0 {
                return Err(SolverError::InvalidInput(format!(
                    "facility {} has negative setup cost {}",
                    facility.id, facility.setup_cost
                )));
            }
            Self::validate_location(&facility.location, metric)?;
        }

        let mut consumer_index = HashMap::with_capacity(consumers.len());
        for (index, consumer) in consumers.iter().enumerate() {
            if consumer_index.insert(consumer.id, index).is_some() {
                return Err(SolverError::InvalidInput(format!("duplicate consumer id {}", consumer.id)));
            }
            if consumer.demand < 0 {
                return Err(SolverError::InvalidInput(format!(
                    "consumer {} has negative demand {}",
                    consumer.id, consumer.demand
                )));
            }
            Self::validate_location(&consumer.location, metric)?;
        }

        let distances = Self::compute_distance_matrix(&facilities, &consumers, metric);

        log::debug!(
            "Built instance with {} facilities and {} consumers ({:?} metric)",
            facilities.len(),
            consumers.len(),
            metric
        );

        Ok(FacilityLocationInstance {
            name: String::new(),
            metric,
            facilities,
            consumers,
            distances,
            facility_index,
            consumer_index,
        })
    }

    /// Parse an instance from a JSON file in the [`ProblemInput`] format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let input: ProblemInput = serde_json::from_reader(reader)?;
        input.build()
    }

    /// Serializable copy of this instance.
    pub fn to_input(&self) -> ProblemInput {
        ProblemInput {
            name: self.name.clone(),
            metric: self.metric,
            facilities: self.facilities.clone(),
            consumers: self.consumers.clone(),
        }
    }

    fn validate_location(location: &Location, metric: DistanceMetric) -> Result<()> {
        location.validate()?;
        if metric.is_geographic() {
            location.validate_geographic()?;
        }
        Ok(())
    }

    fn compute_distance_matrix(facilities: &[Facility], consumers: &[Consumer], metric: DistanceMetric) -> Vec<i64> {
        consumers
            .par_iter()
            .flat_map_iter(|consumer| {
                facilities
                    .iter()
                    .map(move |facility| metric.distance(&consumer.location, &facility.location))
            })
            .collect()
    }

    #[inline]
    pub fn facility_count(&self) -> usize {
        self.facilities.len()
    }

    #[inline]
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// Distance between a consumer and a facility, by index.
    #[inline]
    pub fn distance(&self, consumer: usize, facility: usize) -> i64 {
        self.distances[consumer * self.facilities.len() + facility]
    }

    #[inline]
    pub fn demand(&self, consumer: usize) -> i64 {
        self.consumers[consumer].demand
    }

    /// Index of the facility with the given id.
    pub fn facility_index_of(&self, id: i64) -> Result<usize> {
        self.facility_index.get(&id).copied().ok_or_else(|| SolverError::InvalidReference {
            kind: EntityKind::Facility,
            detail: format!("unknown facility id {}", id),
        })
    }

    /// Index of the consumer with the given id.
    pub fn consumer_index_of(&self, id: i64) -> Result<usize> {
        self.consumer_index.get(&id).copied().ok_or_else(|| SolverError::InvalidReference {
            kind: EntityKind::Consumer,
            detail: format!("unknown consumer id {}", id),
        })
    }

    pub fn total_capacity(&self) -> i64 {
        self.facilities.iter().map(|f| f.capacity).sum()
    }

    pub fn total_demand(&self) -> i64 {
        self.consumers.iter().map(|c| c.demand).sum()
    }

    /// Largest consumer to facility distance in the instance.
    pub fn max_distance(&self) -> i64 {
        self.distances.iter().copied().max().unwrap_or(0)
    }

    /// South-west and north-east corners of all locations.
    pub fn bounding_box(&self) -> Option<(Location, Location)> {
        let mut locations = self
            .facilities
            .iter()
            .map(|f| f.location)
            .chain(self.consumers.iter().map(|c| c.location));
        let first = locations.next()?;
        let (min, max) = locations.fold((first, first), |(min, max), l| {
            (
                Location { x: min.x.min(l.x), y: min.y.min(l.y) },
                Location { x: max.x.max(l.x), y: max.y.max(l.y) },
            )
        });
        Some((min, max))
    }

    /// Get statistics about the instance
    pub fn statistics(&self) -> InstanceStatistics {
        let total_setup_cost: i64 = self.facilities.iter().map(|f| f.setup_cost).sum();
        let avg_distance = if self.distances.is_empty() {
            0.0
        } else {
            self.distances.iter().sum::<i64>() as f64 / self.distances.len() as f64
        };

        InstanceStatistics {
            name: self.name.clone(),
            metric: self.metric,
            num_facilities: self.facility_count(),
            num_consumers: self.consumer_count(),
            total_capacity: self.total_capacity(),
            total_demand: self.total_demand(),
            total_setup_cost,
            avg_distance,
            max_distance: self.max_distance(),
        }
    }
}

/// Statistics about a CFLP instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatistics {
    pub name: String,
    pub metric: DistanceMetric,
    pub num_facilities: usize,
    pub num_consumers: usize,
    pub total_capacity: i64,
    pub total_demand: i64,
    pub total_setup_cost: i64,
    pub avg_distance: f64,
    pub max_distance: i64,
}

impl std::fmt::Display for InstanceStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Instance: {}", self.name)?;
        writeln!(f, "  Metric: {:?}", self.metric)?;
        writeln!(f, "  Facilities: {}", self.num_facilities)?;
        writeln!(f, "  Consumers: {}", self.num_consumers)?;
        writeln!(f, "  Total capacity: {}", self.total_capacity)?;
        writeln!(f, "  Total demand: {}", self.total_demand)?;
        writeln!(f, "  Total setup cost (all facilities): {}", self.total_setup_cost)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {}", self.max_distance)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn loc(x: f64, y: f64) -> Location {
        Location::new(x, y).unwrap()
    }

    /// Two facilities on a line and three consumers between them.
    pub(crate) fn two_facility_instance() -> FacilityLocationInstance {
        let facilities = vec![
            Facility::new(1, loc(0.0, 0.0), 10, 100),
            Facility::new(2, loc(10.0, 0.0), 10, 50),
        ];
        let consumers = vec![
            Consumer::new(1, loc(0.0, 0.0), 4),
            Consumer::new(2, loc(1.0, 0.0), 4),
            Consumer::new(3, loc(9.0, 0.0), 4),
        ];
        FacilityLocationInstance::new(facilities, consumers, DistanceMetric::Euclidean).unwrap()
    }

    #[test]
    fn test_distance_matrix() {
        let instance = two_facility_instance();

        assert_eq!(instance.distance(0, 0), 0);
        assert_eq!(instance.distance(0, 1), 10);
        assert_eq!(instance.distance(1, 0), 1);
        assert_eq!(instance.distance(2, 1), 1);
        assert_eq!(instance.max_distance(), 10);
    }

    #[test]
    fn test_id_lookup() {
        let instance = two_facility_instance();

        assert_eq!(instance.facility_index_of(2).unwrap(), 1);
        assert_eq!(instance.consumer_index_of(3).unwrap(), 2);
        assert!(matches!(
            instance.facility_index_of(42),
            Err(SolverError::InvalidReference { kind: EntityKind::Facility, .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let facilities = vec![
            Facility::new(1, loc(0.0, 0.0), 10, 100),
            Facility::new(1, loc(1.0, 0.0), 10, 100),
        ];
        let result = FacilityLocationInstance::new(facilities, Vec::new(), DistanceMetric::Euclidean);
        assert!(matches!(result, Err(SolverError::InvalidInput(_))));

        let consumers = vec![Consumer::new(5, loc(0.0, 0.0), 1), Consumer::new(5, loc(0.0, 0.0), 1)];
        let result = FacilityLocationInstance::new(Vec::new(), consumers, DistanceMetric::Euclidean);
        assert!(matches!(result, Err(SolverError::InvalidInput(_))));
    }

    #[test]
    fn test_negative_values_rejected() {
        let negative_capacity = vec![Facility::new(1, loc(0.0, 0.0), -1, 0)];
        assert!(FacilityLocationInstance::new(negative_capacity, Vec::new(), DistanceMetric::Euclidean).is_err());

        let negative_setup = vec![Facility::new(1, loc(0.0, 0.0), 1, -5)];
        assert!(FacilityLocationInstance::new(negative_setup, Vec::new(), DistanceMetric::Euclidean).is_err());

        let negative_demand = vec![Consumer::new(1, loc(0.0, 0.0), -2)];
        assert!(FacilityLocationInstance::new(Vec::new(), negative_demand, DistanceMetric::Euclidean).is_err());
    }

    #[test]
    fn test_geographic_bounds_checked() {
        let facilities = vec![Facility::new(1, Location { x: 120.0, y: 0.0 }, 1, 1)];
        let result = FacilityLocationInstance::new(facilities, Vec::new(), DistanceMetric::Degrees);
        assert!(matches!(result, Err(SolverError::InvalidInput(_))));
    }

    #[test]
    fn test_statistics() {
        let instance = two_facility_instance();
        let stats = instance.statistics();

        assert_eq!(stats.num_facilities, 2);
        assert_eq!(stats.num_consumers, 3);
        assert_eq!(stats.total_capacity, 20);
        assert_eq!(stats.total_demand, 12);
        assert_eq!(stats.total_setup_cost, 150);

        let (sw, ne) = instance.bounding_box().unwrap();
        assert_eq!(sw, loc(0.0, 0.0));
        assert_eq!(ne, loc(10.0, 0.0));
    }

    #[test]
    fn test_input_round_trip_through_json() {
        let instance = two_facility_instance();
        let json = serde_json::to_string(&instance.to_input()).unwrap();
        let parsed: ProblemInput = serde_json::from_str(&json).unwrap();
        let rebuilt = parsed.build().unwrap();

        assert_eq!(rebuilt.facilities, instance.facilities);
        assert_eq!(rebuilt.consumers, instance.consumers);
    }
}
