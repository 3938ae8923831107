//! Genome operations for the outer parameter search.
//!
//! A genome is the flat bundle of simulation constants subject to
//! evolution. Randomization, crossover and mutation are explicit per-field
//! rules; each field carries its own perturbation semantics and bounds.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::SolverConfig;

/// Evolvable simulation constants plus the metrics attached after fitness
/// evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGenome {
    pub attraction_strength: f32,
    pub activation_threshold: f32,
    pub refractory_period: f32,
    pub fusion_threshold: f32,
    pub fission_threshold: f32,
    pub initial_temperature: f32,
    pub cooling_rate: f32,
    pub inhibition_radius: f32,
    pub inhibition_strength: f32,
    pub diversity_pressure: f32,
    pub perturbation_period: u32,
    pub perturbation_strength: f32,

    // Metrics, filled in by fitness evaluation.
    #[serde(default)]
    pub fitness: f32,
    #[serde(default)]
    pub solved: usize,
    #[serde(default)]
    pub mean_convergence_time: f32,
}

impl Default for ParameterGenome {
    fn default() -> Self {
        let config = SolverConfig::default();
        Self {
            attraction_strength: config.attraction_strength,
            activation_threshold: config.activation_threshold,
            refractory_period: config.refractory_period,
            fusion_threshold: config.fusion_threshold,
            fission_threshold: config.fission_threshold,
            initial_temperature: config.initial_temperature,
            cooling_rate: config.cooling_rate,
            inhibition_radius: config.inhibition_radius,
            inhibition_strength: config.inhibition_strength,
            diversity_pressure: config.diversity_pressure,
            perturbation_period: config.perturbation_period,
            perturbation_strength: config.perturbation_strength,
            fitness: 0.0,
            solved: 0,
            mean_convergence_time: 0.0,
        }
    }
}

impl ParameterGenome {
    /// Overlay the evolvable fields onto a base configuration.
    pub fn to_config(&self, base: &SolverConfig) -> SolverConfig {
        SolverConfig {
            attraction_strength: self.attraction_strength,
            activation_threshold: self.activation_threshold,
            refractory_period: self.refractory_period,
            fusion_threshold: self.fusion_threshold,
            fission_threshold: self.fission_threshold,
            initial_temperature: self.initial_temperature,
            cooling_rate: self.cooling_rate,
            inhibition_radius: self.inhibition_radius,
            inhibition_strength: self.inhibition_strength,
            diversity_pressure: self.diversity_pressure,
            perturbation_period: self.perturbation_period,
            perturbation_strength: self.perturbation_strength,
            min_temperature: base.min_temperature.min(self.initial_temperature),
            ..base.clone()
        }
    }
}

/// Seeded random source for genome operations.
pub struct GenomeRng {
    rng: StdRng,
}

impl GenomeRng {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn random() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    /// Fully randomized genome: the default mutated with probability 1.
    pub fn random_genome(&mut self) -> ParameterGenome {
        let mut genome = ParameterGenome::default();
        self.mutate(&mut genome, 1.0);
        genome
    }

    /// Per-field mutation: each field is independently perturbed with the
    /// given probability by a bounded factor matching its semantics.
    pub fn mutate(&mut self, genome: &mut ParameterGenome, rate: f32) {
        if self.hit(rate) {
            genome.attraction_strength *= self.factor(0.5, 2.0);
        }
        if self.hit(rate) {
            genome.activation_threshold *= self.factor(0.8, 1.2);
        }
        if self.hit(rate) {
            genome.refractory_period *= self.factor(0.5, 2.0);
        }
        if self.hit(rate) {
            genome.fusion_threshold *= self.factor(0.8, 1.2);
        }
        if self.hit(rate) {
            genome.fission_threshold *= self.factor(0.8, 1.2);
        }
        if self.hit(rate) {
            genome.initial_temperature *= self.factor(0.5, 2.0);
        }
        if self.hit(rate) {
            genome.cooling_rate =
                (genome.cooling_rate * self.factor(0.95, 1.05)).clamp(0.9, 0.999);
        }
        if self.hit(rate) {
            genome.inhibition_radius *= self.factor(0.7, 1.3);
        }
        if self.hit(rate) {
            genome.inhibition_strength *= self.factor(0.7, 1.3);
        }
        if self.hit(rate) {
            genome.diversity_pressure =
                (genome.diversity_pressure * self.factor(0.7, 1.3)).clamp(0.01, 0.9);
        }
        if self.hit(rate) {
            let scaled = genome.perturbation_period as f32 * self.factor(0.5, 2.0);
            genome.perturbation_period = (scaled.round() as u32).clamp(10, 1000);
        }
        if self.hit(rate) {
            genome.perturbation_strength *= self.factor(0.5, 2.0);
        }
    }

    /// Uniform crossover: each field independently inherited from either
    /// parent. Metrics reset to zero.
    pub fn crossover(&mut self, a: &ParameterGenome, b: &ParameterGenome) -> ParameterGenome {
        ParameterGenome {
            attraction_strength: self.pick(a.attraction_strength, b.attraction_strength),
            activation_threshold: self.pick(a.activation_threshold, b.activation_threshold),
            refractory_period: self.pick(a.refractory_period, b.refractory_period),
            fusion_threshold: self.pick(a.fusion_threshold, b.fusion_threshold),
            fission_threshold: self.pick(a.fission_threshold, b.fission_threshold),
            initial_temperature: self.pick(a.initial_temperature, b.initial_temperature),
            cooling_rate: self.pick(a.cooling_rate, b.cooling_rate),
            inhibition_radius: self.pick(a.inhibition_radius, b.inhibition_radius),
            inhibition_strength: self.pick(a.inhibition_strength, b.inhibition_strength),
            diversity_pressure: self.pick(a.diversity_pressure, b.diversity_pressure),
            perturbation_period: self.pick(a.perturbation_period, b.perturbation_period),
            perturbation_strength: self.pick(a.perturbation_strength, b.perturbation_strength),
            fitness: 0.0,
            solved: 0,
            mean_convergence_time: 0.0,
        }
    }

    pub fn next_seed(&mut self) -> u64 {
        self.rng.r#gen()
    }

    pub fn gen_range_usize(&mut self, bound: usize) -> usize {
        self.rng.gen_range(0..bound)
    }

    pub fn chance(&mut self, probability: f32) -> bool {
        self.hit(probability)
    }

    fn hit(&mut self, rate: f32) -> bool {
        self.rng.r#gen::<f32>() < rate
    }

    fn factor(&mut self, low: f32, high: f32) -> f32 {
        self.rng.gen_range(low..=high)
    }

    fn pick<T: Copy>(&mut self, a: T, b: T) -> T {
        if self.rng.gen_bool(0.5) { a } else { b }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_genome_stays_configurable() {
        let mut rng = GenomeRng::new(42);
        for _ in 0..20 {
            let genome = rng.random_genome();
            let config = genome.to_config(&SolverConfig::default());
            assert!(config.validate().is_ok(), "invalid config from {genome:?}");
        }
    }

    #[test]
    fn test_mutation_respects_cooling_bounds() {
        let mut rng = GenomeRng::new(7);
        let mut genome = ParameterGenome::default();
        for _ in 0..200 {
            rng.mutate(&mut genome, 1.0);
            assert!((0.9..=0.999).contains(&genome.cooling_rate));
            assert!((10..=1000).contains(&genome.perturbation_period));
        }
    }

    #[test]
    fn test_crossover_inherits_from_parents() {
        let mut rng = GenomeRng::new(3);
        let a = ParameterGenome {
            attraction_strength: 1.0,
            ..Default::default()
        };
        let b = ParameterGenome {
            attraction_strength: 2.0,
            ..Default::default()
        };

        let child = rng.crossover(&a, &b);
        assert!(
            child.attraction_strength == a.attraction_strength
                || child.attraction_strength == b.attraction_strength
        );
        assert_eq!(child.fitness, 0.0);
    }

    #[test]
    fn test_to_config_overlays_fields() {
        let genome = ParameterGenome {
            attraction_strength: 123.0,
            initial_temperature: 500.0,
            ..Default::default()
        };
        let base = SolverConfig::default();
        let config = genome.to_config(&base);
        assert_eq!(config.attraction_strength, 123.0);
        assert_eq!(config.initial_temperature, 500.0);
        // Non-evolved fields carry over from the base.
        assert_eq!(config.cycle_budget, base.cycle_budget);
    }
}
