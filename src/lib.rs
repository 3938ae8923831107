//! Swarmgrid - emergent particle-swarm solver for colored-grid
//! transformation puzzles.
//!
//! Training pairs of small colored grids are encoded into a particle
//! field whose self-organizing dynamics (pairwise attraction, annealing,
//! lateral inhibition) form clusters; clusters are decoded into typed
//! transformation rules, validated against the training pairs, and the
//! winning rule chain predicts the unseen test grid. An outer genetic
//! search tunes the simulation constants themselves.
//!
//! # Architecture
//!
//! The crate is split into two main modules:
//!
//! - `schema`: grids, tasks, rules and solver configuration
//! - `compute`: codec, particle field, diversity control, clustering,
//!   rule decoding, the direct transformation engine, the validity
//!   oracle, the solve loop and the parameter evolver
//!
//! # Example
//!
//! ```rust,no_run
//! use swarmgrid::{
//!     compute::solve,
//!     schema::{SolverConfig, Task},
//! };
//!
//! let json = r#"{
//!     "train": [
//!         {"input": [[3, 0]], "output": [[7, 0]]},
//!         {"input": [[0, 3]], "output": [[0, 7]]}
//!     ],
//!     "test": [{"input": [[3, 3]]}]
//! }"#;
//! let task: Task = serde_json::from_str(json).unwrap();
//!
//! let prediction = solve(&task, &SolverConfig::default());
//! println!("predicted: {}", serde_json::to_string(&prediction).unwrap());
//! ```

pub mod compute;
pub mod schema;

// Re-export commonly used types
pub use compute::{SolveOutcome, Solver, discover_rules, evolution::evolve_parameters, solve};
pub use schema::{Grid, SolverConfig, Task, TransformationRule};
