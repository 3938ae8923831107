//! Data and configuration types shared across the solver.

mod config;
mod grid;
mod rule;

pub use config::{ConfigError, SolverConfig};
pub use grid::{ColorObject, Example, Grid, GridError, INVALID_CELL, PALETTE_SIZE, Task, TestExample};
pub use rule::{Axis, RuleKind, TransformationRule, draw_line};
