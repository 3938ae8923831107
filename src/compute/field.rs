//! Particle field: arena of particles and their kinematics.
//!
//! Each step applies a sampled pairwise attraction (force proportional to
//! the product of luminosities over squared distance), free propagation,
//! and neighbor-density luminosity reinforcement. The force pass reads a
//! snapshot of the previous step and writes per-particle deltas before a
//! sequential commit, so per-particle work is free of read/write races.

use glam::Vec3;
use rand::prelude::*;
use rayon::prelude::*;

use crate::schema::SolverConfig;

use super::codec::{ParticlePattern, PatternLayer};

/// A single simulated particle. Owned exclusively by [`ParticleField`].
#[derive(Debug, Clone)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Spectral value, bijective with a palette symbol.
    pub wavelength: f32,
    pub luminosity: f32,
    pub energy: f32,
    /// Neighbor-density activation from the last step.
    pub activation: f32,
    /// Originating grid cell (y * width + x).
    pub cell_index: usize,
    /// Training example this particle was injected from.
    pub example: usize,
    pub layer: PatternLayer,
    pub age: f32,
    pub active: bool,
}

/// Per-particle output of the parallel force pass.
#[derive(Debug, Clone, Copy, Default)]
struct StepDelta {
    dv: Vec3,
    activation: f32,
}

/// Arena of particles plus the kinematic update.
pub struct ParticleField {
    particles: Vec<Particle>,
    config: SolverConfig,
    rng: StdRng,
    step_count: u64,
}

impl ParticleField {
    /// Create an empty field. `config` must already be validated.
    pub fn new(config: &SolverConfig, seed: u64) -> Self {
        Self {
            particles: Vec::new(),
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed),
            step_count: 0,
        }
    }

    /// Inject a pattern, recycling inactive slots before growing the arena.
    pub fn inject(&mut self, pattern: &ParticlePattern) {
        let mut free: Vec<usize> = self
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.active)
            .map(|(i, _)| i)
            .collect();

        for i in 0..pattern.len() {
            let particle = Particle {
                position: pattern.positions[i],
                velocity: Vec3::ZERO,
                wavelength: pattern.wavelengths[i],
                luminosity: pattern.intensities[i],
                energy: 1.0,
                activation: 0.0,
                cell_index: pattern.cell_indices[i],
                example: pattern.example,
                layer: pattern.layer,
                age: 0.0,
                active: true,
            };
            match free.pop() {
                Some(slot) => self.particles[slot] = particle,
                None => self.particles.push(particle),
            }
        }
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn particles_mut(&mut self) -> &mut [Particle] {
        &mut self.particles
    }

    pub fn active_count(&self) -> usize {
        self.particles.iter().filter(|p| p.active).count()
    }

    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Advance all particle kinematics by one tick.
    pub fn step(&mut self, dt: f32) {
        let active: Vec<usize> = self
            .particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.active)
            .map(|(i, _)| i)
            .collect();

        // Pairwise dynamics are meaningless below two particles.
        if active.len() < 2 {
            self.step_count += 1;
            return;
        }

        let positions: Vec<Vec3> = self.particles.iter().map(|p| p.position).collect();
        let luminosities: Vec<f32> = self.particles.iter().map(|p| p.luminosity).collect();

        let base_seed: u64 = self.rng.r#gen();
        let config = &self.config;
        let sample_size = config.neighbor_sample_size.min(active.len());

        let deltas: Vec<StepDelta> = self
            .particles
            .par_iter()
            .enumerate()
            .map(|(i, particle)| {
                if !particle.active || particle.age < config.refractory_period {
                    return StepDelta::default();
                }

                let mut rng = StdRng::seed_from_u64(base_seed.wrapping_add(i as u64));
                let mut force = Vec3::ZERO;
                let mut activation_sum = 0.0f32;
                let mut neighbors = 0u32;

                for _ in 0..sample_size {
                    let j = active[rng.gen_range(0..active.len())];
                    if j == i {
                        continue;
                    }

                    let offset = positions[j] - positions[i];
                    let distance = offset.length();
                    if distance < config.min_distance {
                        // Coincident pair; skip to avoid a singular force.
                        continue;
                    }

                    let magnitude = config.attraction_strength * luminosities[i]
                        * luminosities[j]
                        / (distance * distance);
                    force += offset / distance * magnitude;

                    if distance < config.connection_radius {
                        activation_sum += luminosities[j] / (distance + 1.0);
                        neighbors += 1;
                    }
                }

                let activation = if neighbors > 0 {
                    activation_sum / neighbors as f32
                } else {
                    0.0
                };

                // Luminosity stands in for inertial mass.
                let dv = force / luminosities[i].max(1e-6) * dt;
                StepDelta { dv, activation }
            })
            .collect();

        for (i, delta) in deltas.into_iter().enumerate() {
            let particle = &mut self.particles[i];
            if !particle.active {
                continue;
            }

            particle.velocity += delta.dv;
            particle.position += particle.velocity * dt;
            particle.activation = delta.activation;

            // Dense neighborhoods brighten; high-energy particles couple
            // more strongly, low-energy ones leak.
            let gain = if particle.energy > self.config.fusion_threshold {
                1.5
            } else {
                1.0
            };
            particle.luminosity =
                particle.luminosity * 0.99 + delta.activation * 0.01 * gain;
            if particle.energy < self.config.fission_threshold {
                particle.luminosity *= 0.98;
            }

            particle.age += dt;

            if particle.luminosity < self.config.luminosity_floor
                || particle.position.length() > self.config.field_bound
            {
                particle.active = false;
            }
        }

        self.step_count += 1;
    }
}
