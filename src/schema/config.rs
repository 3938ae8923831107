//! Solver configuration: the tunable constants of the particle dynamics,
//! diversity maintenance, clustering and solve loop.
//!
//! Every field here is plain data so the parameter evolver can treat the
//! whole bundle as a genome.

use serde::{Deserialize, Serialize};

/// Complete constant bundle for one solver instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverConfig {
    // --- particle field ---
    /// Pairwise attraction constant (force = strength * l_i * l_j / d^2).
    pub attraction_strength: f32,
    /// Number of randomly sampled neighbors per particle per force pass.
    /// A tunable approximation of the full pairwise sum.
    pub neighbor_sample_size: usize,
    /// Radius for neighbor-density luminosity reinforcement.
    pub connection_radius: f32,
    /// Distance floor; closer pairs are treated as coincident.
    pub min_distance: f32,
    /// Particles beyond this radius from the origin are recycled.
    pub field_bound: f32,
    /// Particles dimmer than this are recycled.
    pub luminosity_floor: f32,
    /// Minimum activation for a particle to join a cluster.
    pub activation_threshold: f32,
    /// Newly emitted particles sit out the force pass this long.
    pub refractory_period: f32,
    /// Energy above which density reinforcement is amplified.
    pub fusion_threshold: f32,
    /// Energy below which luminosity leaks away.
    pub fission_threshold: f32,

    // --- diversity maintenance ---
    pub initial_temperature: f32,
    /// Geometric cooling factor applied once per controller call.
    pub cooling_rate: f32,
    /// Temperature never drops below this; exploration never fully stops.
    pub min_temperature: f32,
    pub inhibition_radius: f32,
    pub inhibition_strength: f32,
    /// Luminosity damping applied to oversized clusters.
    pub diversity_pressure: f32,
    /// Iterations between perturbation events.
    pub perturbation_period: u32,
    /// Scale of the perturbation velocity kick.
    pub perturbation_strength: f32,

    // --- clustering ---
    /// Particles closer than this are linked into one cluster.
    pub link_radius: f32,
    /// Clusters with fewer members are dropped.
    pub min_cluster_size: usize,

    // --- rule decoding ---
    /// Mean speed above which a cluster reads as a translation.
    pub translation_speed_threshold: f32,
    /// Angular momentum magnitude above which a cluster reads as a rotation.
    pub rotation_threshold: f32,

    // --- solve loop ---
    /// Simulation time step.
    pub dt: f32,
    /// Hard cap on simulation cycles before falling back to direct
    /// grid-pair analysis.
    pub cycle_budget: u32,
    /// Cluster extraction runs every this many cycles.
    pub extract_interval: u32,
    /// Rules scoring below this are discarded.
    pub rule_confidence_floor: f32,
    /// Seed for the process-local generator. None draws from entropy.
    #[serde(default)]
    pub random_seed: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            attraction_strength: 50.0,
            neighbor_sample_size: 100,
            connection_radius: 100.0,
            min_distance: 0.1,
            field_bound: 10_000.0,
            luminosity_floor: 0.05,
            activation_threshold: 0.8,
            refractory_period: 0.01,
            fusion_threshold: 0.9,
            fission_threshold: 0.1,
            initial_temperature: 1000.0,
            cooling_rate: 0.995,
            min_temperature: 10.0,
            inhibition_radius: 500.0,
            inhibition_strength: 0.5,
            diversity_pressure: 0.1,
            perturbation_period: 100,
            perturbation_strength: 1.0,
            link_radius: 150.0,
            min_cluster_size: 4,
            translation_speed_threshold: 0.1,
            rotation_threshold: 0.01,
            dt: 0.016,
            cycle_budget: 100,
            extract_interval: 10,
            rule_confidence_floor: 0.5,
            random_seed: None,
        }
    }
}

impl SolverConfig {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dt <= 0.0 {
            return Err(ConfigError::InvalidTimeStep);
        }
        if self.neighbor_sample_size == 0 {
            return Err(ConfigError::InvalidSampleSize);
        }
        if self.cooling_rate <= 0.0 || self.cooling_rate >= 1.0 {
            return Err(ConfigError::InvalidCoolingRate(self.cooling_rate));
        }
        if self.min_temperature > self.initial_temperature {
            return Err(ConfigError::TemperatureFloorAboveInitial);
        }
        if self.min_distance <= 0.0 || self.link_radius <= 0.0 || self.inhibition_radius <= 0.0 {
            return Err(ConfigError::InvalidRadius);
        }
        if self.cycle_budget == 0 || self.extract_interval == 0 {
            return Err(ConfigError::InvalidBudget);
        }
        if !(0.0..=1.0).contains(&self.rule_confidence_floor) {
            return Err(ConfigError::InvalidConfidenceFloor(
                self.rule_confidence_floor,
            ));
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("time step must be positive")]
    InvalidTimeStep,
    #[error("neighbor sample size must be non-zero")]
    InvalidSampleSize,
    #[error("cooling rate {0} must lie in (0, 1)")]
    InvalidCoolingRate(f32),
    #[error("minimum temperature exceeds initial temperature")]
    TemperatureFloorAboveInitial,
    #[error("distance radii must be positive")]
    InvalidRadius,
    #[error("cycle budget and extract interval must be non-zero")]
    InvalidBudget,
    #[error("rule confidence floor {0} must lie in [0, 1]")]
    InvalidConfidenceFloor(f32),
}
