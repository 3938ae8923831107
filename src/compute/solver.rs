//! The per-task solve loop.
//!
//! Training pairs are encoded into the particle field, the field anneals
//! under the diversity controller, and every few cycles clusters are
//! extracted, decoded into rules, oracle-scored and reinforced. A rule
//! chain consistent with every training pair solves the task; exhausting
//! the cycle budget falls back to direct grid-pair analysis, and failing
//! that the input is returned unchanged.

use log::{debug, info};

use crate::schema::{ConfigError, Example, Grid, RuleKind, SolverConfig, Task, TransformationRule};

use super::cluster::ClusterExtractor;
use super::codec::{self, PatternLayer};
use super::decoder::RuleDecoder;
use super::diversity::DiversityController;
use super::engine;
use super::field::ParticleField;
use super::oracle;

/// Solve-loop states, recorded in order in [`SolveOutcome::phases`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolvePhase {
    Idle,
    Injecting,
    Simulating,
    Extracting,
    RuleTesting,
    Solved,
    Fallback,
    Done,
}

/// Result of solving one task.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Predicted grid for the first test example.
    pub prediction: Grid,
    /// The rule chain that produced the prediction; empty for identity.
    pub rules: Vec<TransformationRule>,
    /// Simulation cycles consumed.
    pub cycles: u32,
    /// Whether the direct transformation engine produced the answer.
    pub fallback_used: bool,
    /// Confidence of the leading rule, 0.0 for the identity outcome.
    pub confidence: f32,
    /// Phase transitions in the order they occurred.
    pub phases: Vec<SolvePhase>,
}

/// One solver instance: particle field, diversity controller, extractor
/// and decoder, owned together so several solvers can run concurrently.
pub struct Solver {
    config: SolverConfig,
    field: ParticleField,
    diversity: DiversityController,
    extractor: ClusterExtractor,
    decoder: RuleDecoder,
}

impl Solver {
    pub fn new(config: SolverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let seed = config.random_seed.unwrap_or_else(rand::random);

        Ok(Self {
            field: ParticleField::new(&config, seed),
            diversity: DiversityController::new(&config, seed.wrapping_add(1)),
            extractor: ClusterExtractor::new(&config),
            decoder: RuleDecoder::new(&config),
            config,
        })
    }

    /// Run the full pipeline for one task and predict the first test grid.
    pub fn solve(&mut self, task: &Task) -> SolveOutcome {
        let mut phases = vec![SolvePhase::Idle];

        let Some(test_input) = task.test_examples.first().map(|t| &t.input) else {
            phases.push(SolvePhase::Done);
            return SolveOutcome {
                prediction: Grid::new(0, 0),
                rules: Vec::new(),
                cycles: 0,
                fallback_used: false,
                confidence: 0.0,
                phases,
            };
        };

        let training = &task.training_examples;
        if training.is_empty() {
            // Nothing to learn from; the identity transform is the only
            // defensible answer.
            phases.push(SolvePhase::Done);
            return SolveOutcome {
                prediction: test_input.clone(),
                rules: Vec::new(),
                cycles: 0,
                fallback_used: false,
                confidence: 0.0,
                phases,
            };
        }

        phases.push(SolvePhase::Injecting);
        for (index, example) in training.iter().enumerate() {
            self.field
                .inject(&codec::encode(&example.input, index, PatternLayer::Input));
            self.field
                .inject(&codec::encode(&example.output, index, PatternLayer::Output));
        }
        debug!(
            "injected {} particles from {} training pairs",
            self.field.active_count(),
            training.len()
        );

        phases.push(SolvePhase::Simulating);
        let mut cycles = 0;
        for cycle in 1..=self.config.cycle_budget {
            cycles = cycle;
            self.field.step(self.config.dt);
            self.diversity
                .apply(self.field.particles_mut(), self.config.dt, cycle);

            if cycle % self.config.extract_interval != 0 {
                continue;
            }

            phases.push(SolvePhase::Extracting);
            let candidates = self.extract_and_reinforce(training);

            phases.push(SolvePhase::RuleTesting);
            if let Some(chain) = consistent_chain(&candidates, training) {
                info!("solved in {cycle} cycles with {} rule(s)", chain.len());
                phases.push(SolvePhase::Solved);
                phases.push(SolvePhase::Done);
                let confidence = chain.first().map(|r| r.confidence).unwrap_or(0.0);
                return SolveOutcome {
                    prediction: apply_chain(&chain, test_input),
                    rules: chain,
                    cycles,
                    fallback_used: false,
                    confidence,
                    phases,
                };
            }
            phases.push(SolvePhase::Simulating);
        }

        // Budget exhausted without a consistent rule chain; analyze the
        // grid pairs directly.
        phases.push(SolvePhase::Fallback);
        let rules = engine::discover(training);
        debug!("fallback engine produced {} rule(s)", rules.len());

        let outcome = if rules.is_empty() {
            info!("no rule above the confidence floor; returning input unchanged");
            SolveOutcome {
                prediction: test_input.clone(),
                rules: Vec::new(),
                cycles,
                fallback_used: true,
                confidence: 0.0,
                phases: Vec::new(),
            }
        } else {
            let chain = build_chain(&rules);
            let confidence = chain.first().map(|r| r.confidence).unwrap_or(0.0);
            SolveOutcome {
                prediction: apply_chain(&chain, test_input),
                rules: chain,
                cycles,
                fallback_used: true,
                confidence,
                phases: Vec::new(),
            }
        };

        phases.push(SolvePhase::Done);
        SolveOutcome { phases, ..outcome }
    }

    /// Extract clusters, decode each into a rule, oracle-score it and feed
    /// the score back into member luminosity. Returns scored candidates
    /// above the confidence floor.
    fn extract_and_reinforce(&mut self, training: &[Example]) -> Vec<TransformationRule> {
        let clusters = self.extractor.extract(self.field.particles());
        let mut candidates = Vec::new();

        for cluster in &clusters {
            let mut rule = self.decoder.decode(cluster, self.field.particles());
            let score = oracle::consistency_score(&rule, training);

            let particles = self.field.particles_mut();
            for &member in &cluster.members {
                oracle::reinforce(&mut particles[member], score, self.config.dt);
            }

            if rule.kind != RuleKind::None && score >= self.config.rule_confidence_floor {
                rule.confidence = score;
                candidates.push(rule);
            }
        }

        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        candidates
    }
}

/// Best rule plus up to two runners-up above 0.7 confidence.
fn build_chain(rules: &[TransformationRule]) -> Vec<TransformationRule> {
    let mut chain = Vec::new();
    if let Some(first) = rules.first() {
        chain.push(first.clone());
    }
    for rule in rules.iter().skip(1).take(2) {
        if rule.confidence > 0.7 {
            chain.push(rule.clone());
        }
    }
    chain
}

fn apply_chain(chain: &[TransformationRule], input: &Grid) -> Grid {
    chain
        .iter()
        .fold(input.clone(), |grid, rule| rule.apply(&grid))
}

/// A chain drawn from `candidates` that reproduces every training output
/// exactly, or None.
fn consistent_chain(
    candidates: &[TransformationRule],
    training: &[Example],
) -> Option<Vec<TransformationRule>> {
    if candidates.is_empty() {
        return None;
    }

    let chain = build_chain(candidates);
    let consistent = training
        .iter()
        .all(|example| apply_chain(&chain, &example.input) == example.output);
    if consistent {
        return Some(chain);
    }

    // A single rule may be consistent even when the chain overshoots.
    for rule in candidates {
        if training
            .iter()
            .all(|example| rule.apply(&example.input) == example.output)
        {
            return Some(vec![rule.clone()]);
        }
    }

    None
}

/// Run the full pipeline on a task and return the predicted grid for the
/// first test example.
pub fn solve(task: &Task, config: &SolverConfig) -> Grid {
    match Solver::new(config.clone()) {
        Ok(mut solver) => solver.solve(task).prediction,
        Err(error) => {
            log::warn!("invalid solver configuration ({error}); returning input unchanged");
            task.test_examples
                .first()
                .map(|t| t.input.clone())
                .unwrap_or_else(|| Grid::new(0, 0))
        }
    }
}

/// Expose the direct transformation engine for diagnostic/offline use.
pub fn discover_rules(training_examples: &[Example]) -> Vec<TransformationRule> {
    engine::discover(training_examples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: Vec<Vec<i32>>) -> Grid {
        Grid::from_rows(rows).unwrap()
    }

    fn quick_config() -> SolverConfig {
        SolverConfig {
            cycle_budget: 10,
            extract_interval: 5,
            random_seed: Some(11),
            ..Default::default()
        }
    }

    fn color_map_task() -> Task {
        Task {
            training_examples: vec![
                Example {
                    input: grid(vec![vec![3, 0], vec![1, 3]]),
                    output: grid(vec![vec![7, 0], vec![1, 7]]),
                },
                Example {
                    input: grid(vec![vec![0, 3], vec![3, 2]]),
                    output: grid(vec![vec![0, 7], vec![7, 2]]),
                },
            ],
            test_examples: vec![crate::schema::TestExample {
                input: grid(vec![vec![3, 3], vec![0, 1]]),
                output: None,
            }],
        }
    }

    #[test]
    fn test_empty_training_short_circuits_to_identity() {
        let task = Task {
            training_examples: Vec::new(),
            test_examples: vec![crate::schema::TestExample {
                input: grid(vec![vec![1, 2], vec![3, 4]]),
                output: None,
            }],
        };

        let mut solver = Solver::new(quick_config()).unwrap();
        let outcome = solver.solve(&task);
        assert_eq!(outcome.prediction, task.test_examples[0].input);
        assert_eq!(outcome.cycles, 0);
        assert!(outcome.rules.is_empty());
        assert_eq!(outcome.phases.last(), Some(&SolvePhase::Done));
    }

    #[test]
    fn test_missing_test_example_yields_empty_grid() {
        let task = Task {
            training_examples: Vec::new(),
            test_examples: Vec::new(),
        };
        let mut solver = Solver::new(quick_config()).unwrap();
        let outcome = solver.solve(&task);
        assert_eq!(outcome.prediction.width(), 0);
    }

    #[test]
    fn test_color_map_task_is_solved() {
        let task = color_map_task();
        let mut solver = Solver::new(quick_config()).unwrap();
        let outcome = solver.solve(&task);

        // Either the simulation converged or the fallback engine fired;
        // both must land on the same substitution.
        assert_eq!(outcome.prediction, grid(vec![vec![7, 7], vec![0, 1]]));
        assert!(outcome.confidence >= 0.5);
        assert!(outcome.cycles <= quick_config().cycle_budget);
    }

    #[test]
    fn test_unsolvable_task_returns_identity() {
        // Pairs with no consistent transformation at all.
        let task = Task {
            training_examples: vec![
                Example {
                    input: grid(vec![vec![1, 0], vec![0, 0]]),
                    output: grid(vec![vec![0, 0], vec![0, 9]]),
                },
                Example {
                    input: grid(vec![vec![0, 0], vec![2, 0]]),
                    output: grid(vec![vec![5, 0], vec![0, 0]]),
                },
            ],
            test_examples: vec![crate::schema::TestExample {
                input: grid(vec![vec![8, 8], vec![8, 8]]),
                output: None,
            }],
        };

        let mut solver = Solver::new(quick_config()).unwrap();
        let outcome = solver.solve(&task);
        assert!(outcome.fallback_used);
        if outcome.rules.is_empty() {
            assert_eq!(outcome.prediction, task.test_examples[0].input);
            assert_eq!(outcome.confidence, 0.0);
        }
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SolverConfig {
            cycle_budget: 0,
            ..Default::default()
        };
        assert!(Solver::new(config).is_err());
    }

    #[test]
    fn test_solve_entry_point() {
        let task = color_map_task();
        let prediction = solve(&task, &quick_config());
        assert_eq!(prediction, grid(vec![vec![7, 7], vec![0, 1]]));
    }

    #[test]
    fn test_phase_trace_orders_correctly() {
        let task = color_map_task();
        let mut solver = Solver::new(quick_config()).unwrap();
        let outcome = solver.solve(&task);

        assert_eq!(outcome.phases.first(), Some(&SolvePhase::Idle));
        assert_eq!(outcome.phases.get(1), Some(&SolvePhase::Injecting));
        assert_eq!(outcome.phases.last(), Some(&SolvePhase::Done));
    }

    #[test]
    fn test_discover_rules_exposed() {
        let task = color_map_task();
        let rules = discover_rules(&task.training_examples);
        assert!(!rules.is_empty());
        assert!(rules.iter().all(|r| r.confidence >= 0.5));
    }
}
