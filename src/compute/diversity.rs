//! Diversity maintenance: keeps the particle population exploring instead
//! of collapsing into a single early winner.
//!
//! Four mechanisms run in fixed order each call: thermal noise (annealing),
//! lateral inhibition, diversity pressure on oversized groups, and periodic
//! perturbation. Temperature is explicit state owned by the controller, so
//! multiple simulations can run concurrently.

use glam::Vec3;
use rand::prelude::*;

use crate::schema::SolverConfig;

use super::cluster::proximity_partition;
use super::field::Particle;

/// Luminosity above which a particle inhibits its neighbors.
const BRIGHT_THRESHOLD: f32 = 5.0;

/// Inhibition level that triggers a repulsion kick.
const REPULSION_TRIGGER: f32 = 0.1;

/// Modulates particle dynamics to preserve hypothesis diversity.
pub struct DiversityController {
    config: SolverConfig,
    temperature: f32,
    rng: StdRng,
}

impl DiversityController {
    pub fn new(config: &SolverConfig, seed: u64) -> Self {
        Self {
            temperature: config.initial_temperature,
            config: config.clone(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    /// Run all four mechanisms, then cool.
    pub fn apply(&mut self, particles: &mut [Particle], dt: f32, iteration: u32) {
        self.thermal_noise(particles, dt);
        self.lateral_inhibition(particles);
        self.diversity_pressure(particles);

        if iteration != 0 && iteration % self.config.perturbation_period == 0 {
            self.perturb(particles);
        }

        self.temperature =
            (self.temperature * self.config.cooling_rate).max(self.config.min_temperature);
    }

    /// Brownian velocity jitter scaled by sqrt(T) plus stochastic
    /// luminosity fluctuation scaled by T.
    fn thermal_noise(&mut self, particles: &mut [Particle], dt: f32) {
        let magnitude = self.temperature.sqrt() * 0.01;

        for particle in particles.iter_mut().filter(|p| p.active) {
            let kick = Vec3::new(self.normal(), self.normal(), self.normal());
            particle.velocity += kick * magnitude * dt;

            let noise =
                self.rng.gen_range(-0.1..=0.1) * self.temperature / 1000.0;
            particle.luminosity = (particle.luminosity * (1.0 + noise)).clamp(0.1, 100.0);
        }
    }

    /// Bright particles suppress neighbors with an exponentially decaying
    /// field; heavily inhibited particles are pushed away.
    fn lateral_inhibition(&mut self, particles: &mut [Particle]) {
        let radius = self.config.inhibition_radius;
        let strength = self.config.inhibition_strength;

        let mut inhibition = vec![0.0f32; particles.len()];
        for i in 0..particles.len() {
            if !particles[i].active || particles[i].luminosity <= BRIGHT_THRESHOLD {
                continue;
            }
            for j in 0..particles.len() {
                if i == j || !particles[j].active {
                    continue;
                }
                let distance = particles[i].position.distance(particles[j].position);
                if distance < radius {
                    inhibition[j] += strength * particles[i].luminosity * (-distance / radius).exp();
                }
            }
        }

        for (j, particle) in particles.iter_mut().enumerate() {
            if !particle.active {
                continue;
            }
            particle.luminosity /= 1.0 + inhibition[j];
            if inhibition[j] > REPULSION_TRIGGER {
                let direction = self.random_direction().normalize_or_zero();
                particle.velocity += direction * inhibition[j] * 10.0;
            }
        }
    }

    /// Groups holding more than 10% of the active population lose
    /// luminosity and energy.
    fn diversity_pressure(&mut self, particles: &mut [Particle]) {
        let active = particles.iter().filter(|p| p.active).count();
        if active == 0 {
            return;
        }

        let groups = proximity_partition(particles, self.config.link_radius, |_| true);
        let luminosity_damp = 1.0 - self.config.diversity_pressure * 0.5;
        let energy_damp = 1.0 - self.config.diversity_pressure;

        for group in groups {
            if group.len() <= active / 10 {
                continue;
            }
            for index in group {
                particles[index].luminosity *= luminosity_damp;
                particles[index].energy *= energy_damp;
            }
        }
    }

    /// Kick roughly 1% of particles with a large random velocity; a tenth
    /// of those also get a luminosity spike to escape local optima.
    fn perturb(&mut self, particles: &mut [Particle]) {
        let active: Vec<usize> = particles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.active)
            .map(|(i, _)| i)
            .collect();
        if active.is_empty() {
            return;
        }

        let count = (active.len() / 100).max(1);
        for _ in 0..count {
            let index = active[self.rng.gen_range(0..active.len())];
            let kick = self.random_direction() * self.config.perturbation_strength * 100.0;
            particles[index].velocity += kick;

            if self.rng.r#gen::<f32>() < 0.1 {
                particles[index].luminosity *= self.rng.gen_range(2.0..5.0);
            }
        }
    }

    fn random_direction(&mut self) -> Vec3 {
        Vec3::new(
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
            self.rng.gen_range(-1.0..=1.0),
        )
    }

    fn normal(&mut self) -> f32 {
        self.rng.sample(rand_distr::StandardNormal)
    }
}
