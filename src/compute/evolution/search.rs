//! Generational genetic search over solver parameters.
//!
//! Standard GA: parallel fitness evaluation, descending sort, top-10%
//! elitism, tournament selection, uniform crossover and per-field
//! mutation, for a fixed number of generations.

use std::panic::{AssertUnwindSafe, catch_unwind};

use log::{debug, info};
use rayon::prelude::*;

use crate::schema::{SolverConfig, Task};

use super::fitness::{DEFAULT_TASK_CAP, FitnessEvaluator, FitnessReport};
use super::genome::{GenomeRng, ParameterGenome};

/// Settings for one evolution run.
#[derive(Debug, Clone)]
pub struct EvolverConfig {
    pub population_size: usize,
    pub generations: usize,
    pub tournament_size: usize,
    pub crossover_rate: f32,
    pub mutation_rate: f32,
    /// Fraction of the population carried over unchanged each generation.
    pub elite_fraction: f32,
    /// Tasks evaluated per genome per generation.
    pub task_cap: usize,
    /// Non-evolved solver constants.
    pub base_config: SolverConfig,
    pub random_seed: Option<u64>,
}

impl Default for EvolverConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 100,
            tournament_size: 5,
            crossover_rate: 0.7,
            mutation_rate: 0.1,
            elite_fraction: 0.1,
            task_cap: DEFAULT_TASK_CAP,
            base_config: SolverConfig::default(),
            random_seed: None,
        }
    }
}

/// Best/mean fitness per generation.
#[derive(Debug, Clone, Default)]
pub struct EvolutionHistory {
    pub best_fitness: Vec<f32>,
    pub mean_fitness: Vec<f32>,
}

/// Outer genetic optimizer treating the whole pipeline as a black-box
/// fitness function.
pub struct ParameterEvolver {
    config: EvolverConfig,
    rng: GenomeRng,
    population: Vec<ParameterGenome>,
    history: EvolutionHistory,
    generation: usize,
}

impl ParameterEvolver {
    pub fn new(config: EvolverConfig) -> Self {
        let rng = match config.random_seed {
            Some(seed) => GenomeRng::new(seed),
            None => GenomeRng::random(),
        };
        Self {
            config,
            rng,
            population: Vec::new(),
            history: EvolutionHistory::default(),
            generation: 0,
        }
    }

    pub fn history(&self) -> &EvolutionHistory {
        &self.history
    }

    /// Fill the population with fully randomized genomes.
    pub fn initialize(&mut self) {
        self.generation = 0;
        self.history = EvolutionHistory::default();
        self.population = (0..self.config.population_size.max(2))
            .map(|_| self.rng.random_genome())
            .collect();
    }

    /// Run evolution against real tasks; returns the best genome of the
    /// final generation.
    pub fn run(&mut self, tasks: &[Task]) -> ParameterGenome {
        let evaluator = FitnessEvaluator::new(self.config.base_config.clone(), self.config.task_cap);
        self.run_with_fitness(|genome| evaluator.evaluate(genome, tasks))
    }

    /// Run evolution against an arbitrary fitness function. A panicking
    /// evaluation scores zero for that genome; it never aborts the
    /// generation.
    pub fn run_with_fitness<F>(&mut self, fitness: F) -> ParameterGenome
    where
        F: Fn(&ParameterGenome) -> FitnessReport + Sync,
    {
        self.initialize();
        self.evaluate_population(&fitness);
        self.record_history();

        for _ in 0..self.config.generations {
            self.step_generation();
            self.evaluate_population(&fitness);
            self.record_history();

            let best = self.population[0].fitness;
            debug!(
                "generation {}: best fitness {best:.4}, solved {}",
                self.generation, self.population[0].solved
            );
        }

        let best = self.population[0].clone();
        info!(
            "evolution finished after {} generations: fitness {:.4}, {} task(s) solved",
            self.generation, best.fitness, best.solved
        );
        best
    }

    fn evaluate_population<F>(&mut self, fitness: &F)
    where
        F: Fn(&ParameterGenome) -> FitnessReport + Sync,
    {
        self.population.par_iter_mut().for_each(|genome| {
            let report = catch_unwind(AssertUnwindSafe(|| fitness(genome)))
                .unwrap_or_default();
            genome.fitness = if report.fitness.is_finite() {
                report.fitness
            } else {
                0.0
            };
            genome.solved = report.solved;
            genome.mean_convergence_time = report.mean_solve_time;
        });

        self.population
            .sort_by(|a, b| b.fitness.total_cmp(&a.fitness));
    }

    fn record_history(&mut self) {
        let best = self.population.first().map(|g| g.fitness).unwrap_or(0.0);
        let mean = self.population.iter().map(|g| g.fitness).sum::<f32>()
            / self.population.len().max(1) as f32;
        self.history.best_fitness.push(best);
        self.history.mean_fitness.push(mean);
    }

    /// Build the next generation: elites unchanged, the rest from
    /// tournament selection, crossover and mutation.
    fn step_generation(&mut self) {
        let size = self.population.len();
        let elite_count = ((size as f32 * self.config.elite_fraction) as usize).max(1);

        let mut next: Vec<ParameterGenome> = self.population[..elite_count.min(size)].to_vec();

        while next.len() < size {
            let parent_a = self.tournament_select();
            let parent_b = self.tournament_select();

            let mut child = if self.rng.chance(self.config.crossover_rate) {
                self.rng
                    .crossover(&self.population[parent_a], &self.population[parent_b])
            } else {
                self.population[parent_a].clone()
            };
            self.rng.mutate(&mut child, self.config.mutation_rate);
            child.fitness = 0.0;
            child.solved = 0;
            child.mean_convergence_time = 0.0;

            next.push(child);
        }

        self.population = next;
        self.generation += 1;
    }

    /// Sample k genomes, keep the fittest.
    fn tournament_select(&mut self) -> usize {
        let mut best = self.rng.gen_range_usize(self.population.len());
        for _ in 1..self.config.tournament_size.max(1) {
            let candidate = self.rng.gen_range_usize(self.population.len());
            if self.population[candidate].fitness > self.population[best].fitness {
                best = candidate;
            }
        }
        best
    }
}

/// Offline tuning entry point: evolve solver parameters against a corpus
/// of tasks with known test outputs. The returned genome is the caller's
/// to persist.
pub fn evolve_parameters(
    training_tasks: &[Task],
    generations: usize,
    population_size: usize,
) -> ParameterGenome {
    let mut evolver = ParameterEvolver::new(EvolverConfig {
        generations,
        population_size,
        ..Default::default()
    });
    evolver.run(training_tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick_evolver(generations: usize) -> ParameterEvolver {
        ParameterEvolver::new(EvolverConfig {
            population_size: 12,
            generations,
            random_seed: Some(99),
            ..Default::default()
        })
    }

    /// Synthetic fitness with a known optimum region: prefer attraction
    /// strength near 25 and a hot initial temperature.
    fn synthetic_fitness(genome: &ParameterGenome) -> FitnessReport {
        let a = (genome.attraction_strength - 25.0).abs() / 25.0;
        let t = (genome.initial_temperature - 1500.0).abs() / 1500.0;
        FitnessReport {
            fitness: 1.0 / (1.0 + a + t),
            ..Default::default()
        }
    }

    #[test]
    fn test_elitism_never_regresses() {
        let mut evolver = quick_evolver(8);
        let best = evolver.run_with_fitness(synthetic_fitness);

        let history = evolver.history();
        let initial_best = history.best_fitness[0];
        assert!(best.fitness >= initial_best);
        for pair in history.best_fitness.windows(2) {
            assert!(pair[1] >= pair[0] - 1e-6);
        }
    }

    #[test]
    fn test_panicking_fitness_scores_zero() {
        let mut evolver = quick_evolver(1);
        let best = evolver.run_with_fitness(|genome| {
            if genome.attraction_strength > 0.0 {
                panic!("evaluation blew up");
            }
            FitnessReport::default()
        });
        // Every evaluation panicked; evolution still completes.
        assert_eq!(best.fitness, 0.0);
    }

    #[test]
    fn test_population_size_is_stable() {
        let mut evolver = quick_evolver(3);
        evolver.run_with_fitness(synthetic_fitness);
        assert_eq!(evolver.population.len(), 12);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = quick_evolver(4).run_with_fitness(synthetic_fitness);
        let b = quick_evolver(4).run_with_fitness(synthetic_fitness);
        assert_eq!(a.fitness, b.fitness);
        assert_eq!(a.attraction_strength, b.attraction_strength);
    }
}
