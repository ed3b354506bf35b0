//! Locations and distance metrics.
//!
//! Distances are integers (meters for the geographic metrics) so that the
//! score arithmetic built on top of them never drifts.

use crate::error::{Result, SolverError};
use serde::{Deserialize, Serialize};

/// Meters per degree used by the degree metric.
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Mean earth radius used by the haversine metric, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A coordinate pair.
///
/// For planar instances this is `(x, y)`; for the geographic metrics `x` is the
/// latitude and `y` the longitude, both in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    /// Create a location, rejecting non-finite coordinates.
    pub fn new(x: f64, y: f64) -> Result<Self> {
        let location = Location { x, y };
        location.validate()?;
        Ok(location)
    }

    /// Create a location from latitude and longitude in degrees.
    pub fn from_degrees(latitude: f64, longitude: f64) -> Result<Self> {
        let location = Self::new(latitude, longitude)?;
        location.validate_geographic()?;
        Ok(location)
    }

    #[inline]
    pub fn latitude(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn longitude(&self) -> f64 {
        self.y
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !self.x.is_finite() || !self.y.is_finite() {
            return Err(SolverError::InvalidInput(format!(
                "location ({}, {}) has non-finite coordinates",
                self.x, self.y
            )));
        }
        Ok(())
    }

    pub(crate) fn validate_geographic(&self) -> Result<()> {
        if !(-90.0..=90.0).contains(&self.x) || !(-180.0..=180.0).contains(&self.y) {
            return Err(SolverError::InvalidInput(format!(
                "location ({}, {}) is not a valid latitude/longitude pair",
                self.x, self.y
            )));
        }
        Ok(())
    }
}

/// Distance metric between two locations.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Planar Euclidean distance, rounded up to whole units.
    #[default]
    Euclidean,
    /// Euclidean distance over degrees scaled by [`METERS_PER_DEGREE`].
    Degrees,
    /// Great-circle distance in meters.
    Haversine,
}

impl DistanceMetric {
    /// Whether locations are interpreted as latitude/longitude pairs.
    pub fn is_geographic(&self) -> bool {
        !matches!(self, DistanceMetric::Euclidean)
    }

    /// Distance between two locations. Symmetric, non-negative and zero on
    /// identical locations.
    #[inline]
    pub fn distance(&self, a: &Location, b: &Location) -> i64 {
        match self {
            DistanceMetric::Euclidean => euclidean(a, b).ceil() as i64,
            DistanceMetric::Degrees => (euclidean(a, b) * METERS_PER_DEGREE).ceil() as i64,
            DistanceMetric::Haversine => haversine(a, b).ceil() as i64,
        }
    }
}

#[inline]
fn euclidean(a: &Location, b: &Location) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    (dx * dx + dy * dy).sqrt()
}

fn haversine(a: &Location, b: &Location) -> f64 {
    let lat_a = a.latitude().to_radians();
    let lat_b = b.latitude().to_radians();
    let half_dlat = (lat_b - lat_a) / 2.0;
    let half_dlng = (b.longitude() - a.longitude()).to_radians() / 2.0;

    let h = half_dlat.sin().powi(2) + lat_a.cos() * lat_b.cos() * half_dlng.sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().min(1.0).asin()
}
