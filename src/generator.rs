//! Random demo instances.
//!
//! Facilities and consumers are scattered uniformly inside a latitude and
//! longitude box and measured with the degree metric. Capacity and demand are
//! split evenly, setup costs vary uniformly around their average.

use crate::error::{Result, SolverError};
use crate::instance::{Consumer, Facility, FacilityLocationInstance};
use crate::location::{DistanceMetric, Location};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

#[derive(Debug, Clone)]
pub struct DemoDataBuilder {
    pub name: String,
    pub consumer_count: usize,
    pub facility_count: usize,
    /// Capacity summed over all facilities
    pub total_capacity: i64,
    /// Demand summed over all consumers
    pub total_demand: i64,
    pub average_setup_cost: i64,
    /// Maximum deviation of a setup cost from the average
    pub setup_cost_variation: i64,
    pub south_west: Location,
    pub north_east: Location,
    pub seed: u64,
}

impl DemoDataBuilder {
    pub fn new() -> Self {
        DemoDataBuilder {
            name: "demo".to_string(),
            consumer_count: 60,
            facility_count: 30,
            total_capacity: 4_500,
            total_demand: 900,
            average_setup_cost: 50_000,
            setup_cost_variation: 10_000,
            south_west: Location { x: 51.44, y: -0.16 },
            north_east: Location { x: 51.56, y: -0.01 },
            seed: 0,
        }
    }

    pub fn with_counts(mut self, consumer_count: usize, facility_count: usize) -> Self {
        self.consumer_count = consumer_count;
        self.facility_count = facility_count;
        self
    }

    pub fn with_totals(mut self, total_capacity: i64, total_demand: i64) -> Self {
        self.total_capacity = total_capacity;
        self.total_demand = total_demand;
        self
    }

    pub fn with_setup_cost(mut self, average: i64, variation: i64) -> Self {
        self.average_setup_cost = average;
        self.setup_cost_variation = variation;
        self
    }

    pub fn with_bounds(mut self, south_west: Location, north_east: Location) -> Self {
        self.south_west = south_west;
        self.north_east = north_east;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.consumer_count == 0 || self.facility_count == 0 {
            return Err(SolverError::InvalidInput(
                "demo data needs at least one consumer and one facility".to_string(),
            ));
        }
        if self.total_capacity < 0 || self.total_demand < 0 || self.average_setup_cost < 0 || self.setup_cost_variation < 0 {
            return Err(SolverError::InvalidInput(format!(
                "demo data totals must be non-negative: capacity {}, demand {}, setup {} +/- {}",
                self.total_capacity, self.total_demand, self.average_setup_cost, self.setup_cost_variation
            )));
        }
        self.south_west.validate_geographic()?;
        self.north_east.validate_geographic()?;
        if self.south_west.x > self.north_east.x || self.south_west.y > self.north_east.y {
            return Err(SolverError::InvalidInput(format!(
                "south-west corner {:?} is not below and left of north-east corner {:?}",
                self.south_west, self.north_east
            )));
        }
        Ok(())
    }

    fn random_location(&self, rng: &mut ChaCha8Rng) -> Result<Location> {
        let latitude = self.south_west.x + rng.gen::<f64>() * (self.north_east.x - self.south_west.x);
        let longitude = self.south_west.y + rng.gen::<f64>() * (self.north_east.y - self.south_west.y);
        Location::from_degrees(latitude, longitude)
    }

    pub fn build(&self) -> Result<FacilityLocationInstance> {
        self.validate()?;
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let capacity = self.total_capacity / self.facility_count as i64;
        let demand = self.total_demand / self.consumer_count as i64;

        let mut facilities = Vec::with_capacity(self.facility_count);
        for id in 0..self.facility_count {
            let location = self.random_location(&mut rng)?;
            let spread = rng.gen_range(-self.setup_cost_variation..=self.setup_cost_variation);
            let setup_cost = (self.average_setup_cost + spread).max(0);
            facilities.push(Facility::new(id as i64, location, capacity, setup_cost));
        }

        let mut consumers = Vec::with_capacity(self.consumer_count);
        for id in 0..self.consumer_count {
            let location = self.random_location(&mut rng)?;
            consumers.push(Consumer::new(id as i64, location, demand));
        }

        let mut instance = FacilityLocationInstance::new(facilities, consumers, DistanceMetric::Degrees)?;
        instance.name = self.name.clone();
        log::info!(
            "Generated {}: {} facilities, {} consumers (seed {})",
            instance.name,
            self.facility_count,
            self.consumer_count,
            self.seed
        );
        Ok(instance)
    }
}

impl Default for DemoDataBuilder {
    fn default() -> Self {
        Self::new()
    }
}
