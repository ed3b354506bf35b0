//! Heuristics module for CFLP.
//!
//! This module exports the construction heuristics, the move generator, the
//! acceptance and termination policies and the local search engine built
//! from them.

pub mod construction;
pub mod moves;
pub mod acceptor;
pub mod termination;
pub mod local_search;
pub mod multi_start;

pub use construction::*;
pub use moves::*;
pub use acceptor::*;
pub use termination::*;
pub use local_search::*;
pub use multi_start::*;
