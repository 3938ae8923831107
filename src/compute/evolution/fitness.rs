//! End-to-end fitness evaluation for parameter genomes.
//!
//! A genome's fitness is measured by running the whole solve pipeline on a
//! capped subset of tasks with known test outputs, combining accuracy,
//! inverse solve time and the fraction of tasks solved above a 95%
//! accuracy bar.

use std::time::Instant;

use crate::compute::solver::Solver;
use crate::schema::{SolverConfig, Task};

use super::genome::ParameterGenome;

/// Tasks evaluated per genome; bounds runtime per generation.
pub const DEFAULT_TASK_CAP: usize = 10;

/// Accuracy above which a task counts as solved.
pub const SOLVED_ACCURACY_BAR: f32 = 0.95;

/// Fitness combination weights: accuracy, speed, solved fraction.
const ACCURACY_WEIGHT: f32 = 0.5;
const SPEED_WEIGHT: f32 = 0.2;
const SOLVED_WEIGHT: f32 = 0.3;

/// Outcome of evaluating one genome.
#[derive(Debug, Clone, Copy, Default)]
pub struct FitnessReport {
    pub fitness: f32,
    pub accuracy: f32,
    pub solved: usize,
    pub evaluated: usize,
    pub mean_solve_time: f32,
}

/// Evaluates genomes by solving real tasks.
pub struct FitnessEvaluator {
    base_config: SolverConfig,
    task_cap: usize,
}

impl FitnessEvaluator {
    pub fn new(base_config: SolverConfig, task_cap: usize) -> Self {
        Self {
            base_config,
            task_cap: task_cap.max(1),
        }
    }

    /// Run the pipeline on up to `task_cap` tasks that carry a known test
    /// output and score the genome. Any failure scores zero rather than
    /// propagating.
    pub fn evaluate(&self, genome: &ParameterGenome, tasks: &[Task]) -> FitnessReport {
        let config = genome.to_config(&self.base_config);
        if config.validate().is_err() {
            return FitnessReport::default();
        }

        let subset: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.test_examples.first().is_some_and(|e| e.output.is_some()))
            .take(self.task_cap)
            .collect();
        if subset.is_empty() {
            return FitnessReport::default();
        }

        let mut total_accuracy = 0.0f32;
        let mut total_time = 0.0f32;
        let mut solved = 0usize;

        for task in &subset {
            let Ok(mut solver) = Solver::new(config.clone()) else {
                return FitnessReport::default();
            };

            let start = Instant::now();
            let outcome = solver.solve(task);
            let elapsed = start.elapsed().as_secs_f32();

            let expected = task.test_examples[0]
                .output
                .as_ref()
                .expect("subset is filtered to tasks with known outputs");
            let accuracy = outcome.prediction.match_fraction(expected);

            if accuracy > SOLVED_ACCURACY_BAR {
                solved += 1;
            }
            total_accuracy += accuracy;
            total_time += elapsed;
        }

        let count = subset.len() as f32;
        let accuracy = total_accuracy / count;
        let mean_solve_time = total_time / count;
        let speed = 1.0 / (1.0 + mean_solve_time);
        let solved_ratio = solved as f32 / count;

        FitnessReport {
            fitness: ACCURACY_WEIGHT * accuracy
                + SPEED_WEIGHT * speed
                + SOLVED_WEIGHT * solved_ratio,
            accuracy,
            solved,
            evaluated: subset.len(),
            mean_solve_time,
        }
    }
}
