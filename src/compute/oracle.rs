//! Validity oracle: the only scoring authority allowed to read ground
//! truth, and only ever the training pairs.
//!
//! A candidate rule is replayed against every training input and compared
//! cell-by-cell with the known training output. The resulting consistency
//! score feeds back into particle luminosity, which is how the simulation
//! discovers valid structure without supervised gradients.

use crate::schema::{Example, TransformationRule};

use super::field::Particle;

/// Mean exact-match fraction of `rule` replayed over all training pairs.
///
/// Always in [0, 1]; exactly 1.0 iff the rule reproduces every training
/// output cell-for-cell. A dimension mismatch scores 0 for that pair.
/// An empty example set scores 0: a rule with no evidence is worthless.
pub fn consistency_score(rule: &TransformationRule, training_examples: &[Example]) -> f32 {
    if training_examples.is_empty() {
        return 0.0;
    }

    let total: f32 = training_examples
        .iter()
        .map(|example| rule.apply(&example.input).match_fraction(&example.output))
        .sum();

    (total / training_examples.len() as f32).clamp(0.0, 1.0)
}

/// Nudge a particle toward `luminosity * (1 + score)` with exponential
/// smoothing, and feed energy proportional to the score.
pub fn reinforce(particle: &mut Particle, score: f32, dt: f32) {
    let rate = (dt * 10.0).min(1.0);
    let target = particle.luminosity * (1.0 + score);
    particle.luminosity += (target - particle.luminosity) * rate;
    particle.energy += score * 0.1 * dt;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::codec::{PatternLayer, wavelength_for};
    use crate::schema::{Grid, RuleKind};
    use glam::Vec3;
    use std::collections::BTreeMap;

    fn example(input: Vec<Vec<i32>>, output: Vec<Vec<i32>>) -> Example {
        Example {
            input: Grid::from_rows(input).unwrap(),
            output: Grid::from_rows(output).unwrap(),
        }
    }

    #[test]
    fn test_score_is_one_iff_exact() {
        let examples = vec![
            example(vec![vec![3, 0]], vec![vec![7, 0]]),
            example(vec![vec![0, 3]], vec![vec![0, 7]]),
        ];
        let exact = TransformationRule::new(
            RuleKind::ColorMap {
                map: BTreeMap::from([(3, 7)]),
            },
            0.0,
        );
        assert_eq!(consistency_score(&exact, &examples), 1.0);

        let wrong = TransformationRule::new(
            RuleKind::ColorMap {
                map: BTreeMap::from([(3, 5)]),
            },
            0.0,
        );
        assert!(consistency_score(&wrong, &examples) < 1.0);
    }

    #[test]
    fn test_score_bounded() {
        let examples = vec![example(vec![vec![1, 2], vec![3, 4]], vec![vec![4, 3], vec![2, 1]])];
        let rules = [
            TransformationRule::none(),
            TransformationRule::new(RuleKind::Translation { dx: 5, dy: -5 }, 0.0),
            TransformationRule::new(RuleKind::Rotation { quarter_turns: 2 }, 0.0),
        ];
        for rule in &rules {
            let score = consistency_score(rule, &examples);
            assert!((0.0..=1.0).contains(&score), "{rule} scored {score}");
        }
    }

    #[test]
    fn test_dimension_mismatch_scores_zero() {
        // A quarter turn of a non-square grid changes its dimensions.
        let examples = vec![example(vec![vec![1, 2, 3]], vec![vec![1, 2, 3]])];
        let rule = TransformationRule::new(RuleKind::Rotation { quarter_turns: 1 }, 0.0);
        assert_eq!(consistency_score(&rule, &examples), 0.0);
    }

    #[test]
    fn test_empty_examples_score_zero() {
        assert_eq!(consistency_score(&TransformationRule::none(), &[]), 0.0);
    }

    #[test]
    fn test_reinforce_brightens_valid_particles() {
        let mut particle = Particle {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            wavelength: wavelength_for(1),
            luminosity: 2.0,
            energy: 1.0,
            activation: 0.0,
            cell_index: 0,
            example: 0,
            layer: PatternLayer::Input,
            age: 0.0,
            active: true,
        };

        reinforce(&mut particle, 0.0, 0.016);
        assert_eq!(particle.luminosity, 2.0);
        assert_eq!(particle.energy, 1.0);

        reinforce(&mut particle, 1.0, 0.016);
        assert!(particle.luminosity > 2.0);
        assert!(particle.luminosity <= 4.0);
        assert!(particle.energy > 1.0);
    }
}
