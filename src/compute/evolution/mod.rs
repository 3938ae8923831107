//! Outer evolutionary search over solver hyperparameters.
//!
//! The whole solve pipeline is treated as a black-box fitness function:
//! each genome is a bundle of simulation constants, evaluated by solving
//! a capped subset of tasks and scoring accuracy, speed and solved count.
//!
//! - **Genome operations** (`genome`): per-field randomization, crossover
//!   and mutation
//! - **Fitness** (`fitness`): end-to-end task evaluation
//! - **Search** (`search`): the generational genetic algorithm

mod fitness;
mod genome;
mod search;

pub use fitness::{DEFAULT_TASK_CAP, FitnessEvaluator, FitnessReport, SOLVED_ACCURACY_BAR};
pub use genome::{GenomeRng, ParameterGenome};
pub use search::{EvolutionHistory, EvolverConfig, ParameterEvolver, evolve_parameters};
