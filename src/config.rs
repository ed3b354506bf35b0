//! Solver configuration.
//!
//! Every field has a default, so a JSON config file only needs to name what
//! it changes.

use crate::error::{Result, SolverError};
use crate::heuristics::acceptor::{Acceptor, HillClimbing, LateAcceptance, SimulatedAnnealing, TabuSearch};
use crate::heuristics::construction::InitialAssignment;
use crate::heuristics::local_search::LocalSearch;
use crate::heuristics::moves::MoveGenerator;
use crate::heuristics::termination::{
    CompositeTermination, StepCountTermination, Termination, TimeTermination, UnimprovedStepTermination,
};
use crate::score::{ScoreCalculator, ScoreWeights};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::time::Duration;

/// Search budget. The search stops as soon as any configured limit is hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerminationConfig {
    pub max_iterations: Option<u64>,
    pub max_seconds: Option<f64>,
    /// Iterations without a new best score
    pub max_unimproved_iterations: Option<u64>,
}

impl Default for TerminationConfig {
    fn default() -> Self {
        TerminationConfig {
            max_iterations: Some(100_000),
            max_seconds: None,
            max_unimproved_iterations: None,
        }
    }
}

impl TerminationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations.is_none() && self.max_seconds.is_none() && self.max_unimproved_iterations.is_none() {
            return Err(SolverError::InvalidConfig(
                "at least one termination limit must be set".to_string(),
            ));
        }
        if let Some(seconds) = self.max_seconds {
            if !seconds.is_finite() || seconds < 0.0 {
                return Err(SolverError::InvalidConfig(format!("invalid time limit {}s", seconds)));
            }
        }
        Ok(())
    }

    pub fn build(&self) -> Result<Box<dyn Termination>> {
        self.validate()?;

        let mut composite = CompositeTermination::new();
        if let Some(n) = self.max_iterations {
            composite.add_termination(StepCountTermination::new(n));
        }
        if let Some(seconds) = self.max_seconds {
            composite.add_termination(TimeTermination::new(Duration::from_secs_f64(seconds)));
        }
        if let Some(n) = self.max_unimproved_iterations {
            composite.add_termination(UnimprovedStepTermination::new(n));
        }
        Ok(Box::new(composite))
    }
}

/// Acceptance strategy and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcceptorConfig {
    HillClimbing,
    SimulatedAnnealing {
        initial_temperature: f64,
        final_temperature: f64,
        hard_weight: f64,
    },
    TabuSearch {
        tenure: u64,
    },
    LateAcceptance {
        size: usize,
    },
}

impl Default for AcceptorConfig {
    fn default() -> Self {
        let sa = SimulatedAnnealing::new();
        AcceptorConfig::SimulatedAnnealing {
            initial_temperature: sa.initial_temperature,
            final_temperature: sa.final_temperature,
            hard_weight: sa.hard_weight,
        }
    }
}

impl AcceptorConfig {
    pub fn validate(&self) -> Result<()> {
        match *self {
            AcceptorConfig::HillClimbing => Ok(()),
            AcceptorConfig::SimulatedAnnealing { initial_temperature, final_temperature, hard_weight } => {
                if !(initial_temperature > 0.0 && initial_temperature.is_finite()) {
                    return Err(SolverError::InvalidConfig(format!(
                        "initial temperature must be positive, got {}",
                        initial_temperature
                    )));
                }
                if !(final_temperature > 0.0 && final_temperature <= initial_temperature) {
                    return Err(SolverError::InvalidConfig(format!(
                        "final temperature must be in (0, {}], got {}",
                        initial_temperature, final_temperature
                    )));
                }
                if !(hard_weight > 0.0 && hard_weight.is_finite()) {
                    return Err(SolverError::InvalidConfig(format!(
                        "annealing hard weight must be positive, got {}",
                        hard_weight
                    )));
                }
                Ok(())
            }
            AcceptorConfig::TabuSearch { tenure } => {
                if tenure == 0 {
                    return Err(SolverError::InvalidConfig("tabu tenure must be positive".to_string()));
                }
                Ok(())
            }
            AcceptorConfig::LateAcceptance { size } => {
                if size == 0 {
                    return Err(SolverError::InvalidConfig("late acceptance size must be positive".to_string()));
                }
                Ok(())
            }
        }
    }

    pub fn build(&self) -> Result<Box<dyn Acceptor>> {
        self.validate()?;
        Ok(match *self {
            AcceptorConfig::HillClimbing => Box::new(HillClimbing),
            AcceptorConfig::SimulatedAnnealing { initial_temperature, final_temperature, hard_weight } => {
                Box::new(SimulatedAnnealing::with_params(initial_temperature, final_temperature, hard_weight))
            }
            AcceptorConfig::TabuSearch { tenure } => Box::new(TabuSearch::new(tenure)),
            AcceptorConfig::LateAcceptance { size } => Box::new(LateAcceptance::new(size)),
        })
    }
}

/// Move selection parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveConfig {
    pub swap_probability: f64,
    pub swap_attempts: usize,
}

impl Default for MoveConfig {
    fn default() -> Self {
        let generator = MoveGenerator::new();
        MoveConfig {
            swap_probability: generator.swap_probability,
            swap_attempts: generator.swap_attempts,
        }
    }
}

impl MoveConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.swap_probability) {
            return Err(SolverError::InvalidConfig(format!(
                "swap probability must be in [0, 1], got {}",
                self.swap_probability
            )));
        }
        Ok(())
    }

    pub fn build(&self) -> Result<MoveGenerator> {
        self.validate()?;
        Ok(MoveGenerator::with_params(self.swap_probability, self.swap_attempts))
    }
}

/// Full configuration of a local search run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub seed: u64,
    pub weights: ScoreWeights,
    pub termination: TerminationConfig,
    pub acceptor: AcceptorConfig,
    pub moves: MoveConfig,
    pub initial_assignment: InitialAssignment,
    /// Compare the tracked score with a full recomputation every this many
    /// iterations; 0 disables the check
    pub consistency_check_interval: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            seed: 42,
            weights: ScoreWeights::default(),
            termination: TerminationConfig::default(),
            acceptor: AcceptorConfig::default(),
            moves: MoveConfig::default(),
            initial_assignment: InitialAssignment::default(),
            consistency_check_interval: 10_000,
        }
    }
}

impl SolverConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let config: SolverConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;
        self.termination.validate()?;
        self.acceptor.validate()?;
        self.moves.validate()
    }

    /// Build a search engine for this configuration, seeded with `self.seed`.
    pub fn build_engine(&self) -> Result<LocalSearch> {
        self.weights.validate()?;
        let engine = LocalSearch::new(
            ScoreCalculator::new(self.weights),
            self.moves.build()?,
            self.acceptor.build()?,
            self.termination.build()?,
            self.seed,
        )
        .with_construction(self.initial_assignment.heuristic(self.seed))
        .with_consistency_check(self.consistency_check_interval);
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SolverConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.termination.build().is_ok());
        assert_eq!(config.acceptor.build().unwrap().name(), "SimulatedAnnealing");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{
            "seed": 7,
            "weights": { "setup_weight": 3 },
            "termination": { "max_iterations": null, "max_seconds": 1.5 },
            "acceptor": { "type": "tabu_search", "tenure": 9 },
            "initial_assignment": "random"
        }"#;
        let config: SolverConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.weights.setup_weight, 3);
        assert_eq!(config.weights.distance_weight, 5);
        assert_eq!(config.termination.max_iterations, None);
        assert_eq!(config.termination.max_seconds, Some(1.5));
        assert_eq!(config.acceptor, AcceptorConfig::TabuSearch { tenure: 9 });
        assert_eq!(config.initial_assignment, InitialAssignment::Random);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_termination_rejected() {
        let termination = TerminationConfig {
            max_iterations: None,
            max_seconds: None,
            max_unimproved_iterations: None,
        };
        assert!(matches!(termination.build(), Err(SolverError::InvalidConfig(_))));
    }

    #[test]
    fn test_invalid_acceptors_rejected() {
        let bad = [
            AcceptorConfig::SimulatedAnnealing { initial_temperature: 0.0, final_temperature: 0.0, hard_weight: 1.0 },
            AcceptorConfig::SimulatedAnnealing { initial_temperature: 1.0, final_temperature: 2.0, hard_weight: 1.0 },
            AcceptorConfig::TabuSearch { tenure: 0 },
            AcceptorConfig::LateAcceptance { size: 0 },
        ];
        for config in &bad {
            assert!(config.build().is_err(), "{:?}", config);
        }
    }

    #[test]
    fn test_build_engine() {
        let config = SolverConfig {
            acceptor: AcceptorConfig::LateAcceptance { size: 10 },
            ..SolverConfig::default()
        };
        let engine = config.build_engine().unwrap();
        assert_eq!(engine.acceptor_name(), "LateAcceptance");
        assert_eq!(engine.seed, 42);

        let bad = SolverConfig {
            weights: ScoreWeights { hard_weight: 0, ..ScoreWeights::default() },
            ..SolverConfig::default()
        };
        assert!(bad.build_engine().is_err());
    }

    #[test]
    fn test_invalid_swap_probability_rejected() {
        let moves = MoveConfig { swap_probability: 1.5, swap_attempts: 1 };
        assert!(moves.build().is_err());
    }
}
