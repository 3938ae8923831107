//! Compute module - the numerical and algorithmic core of the solver.

mod cluster;
mod codec;
mod decoder;
mod diversity;
mod engine;
mod field;
mod oracle;
mod solver;

pub mod evolution;

pub use cluster::{Cluster, ClusterExtractor, proximity_partition};
pub use codec::{
    GRID_SCALE, LAYER_SPACING, ParticlePattern, PatternLayer, color_for, decode, encode, layer_z,
    wavelength_for,
};
pub use decoder::RuleDecoder;
pub use diversity::DiversityController;
pub use engine::discover;
pub use field::{Particle, ParticleField};
pub use oracle::{consistency_score, reinforce};
pub use solver::{SolveOutcome, SolvePhase, Solver, discover_rules, solve};
