//! Colony module - Pheromone model and failure diagnosis.
//!
//! [`PheromoneModel`] tracks, for every parent operation, how strongly each
//! child combination is associated with a [`Label`]. Wrapped in
//! [`PheromoneSelection`] it replaces uniform child choice in the tree
//! builder; [`diagnose`] uses it to localize evaluation failures.

mod diagnosis;
mod pheromone;

pub use diagnosis::*;
pub use pheromone::*;
