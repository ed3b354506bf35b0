//! CFLP Solver Library
//!
//! A local search solver for the Capacitated Facility Location Problem:
//! assign every consumer to one facility so that no facility serves more
//! demand than its capacity, while minimizing the weighted sum of assignment
//! distances and the setup costs of the facilities in use.
//!
//! # Features
//!
//! - Hard/soft scoring with O(1) incremental move deltas
//! - Reassign and swap moves, applied in place and undone exactly
//! - Hill climbing, simulated annealing, tabu search and late acceptance
//! - Step count, time and plateau termination
//! - Parallel multi-start, demo instance generation and JSON/CSV reports
//!
//! # Example
//!
//! ```no_run
//! use cflp_solver::config::SolverConfig;
//! use cflp_solver::instance::FacilityLocationInstance;
//! use cflp_solver::report::SolutionReport;
//!
//! let instance = FacilityLocationInstance::from_file("instance.json").unwrap();
//! let config = SolverConfig::default();
//!
//! let mut engine = config.build_engine().unwrap();
//! let result = engine.solve(&instance).unwrap();
//!
//! let report = SolutionReport::new(&instance, &engine.calculator, &result.best);
//! println!("{}", report);
//! ```

pub mod error;
pub mod location;
pub mod instance;
pub mod score;
pub mod solution;
pub mod heuristics;
pub mod config;
pub mod generator;
pub mod report;

pub use config::SolverConfig;
pub use error::{Result, SolverError};
pub use instance::FacilityLocationInstance;
pub use score::HardSoftScore;
pub use solution::Solution;
