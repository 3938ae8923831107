//! Direct rule discovery from raw grid pairs.
//!
//! The transformation engine analyzes training pairs without any
//! simulation: object motion, color substitution, symmetry, connectivity
//! and repeating-block fills. It runs as fallback and complement to the
//! particle pipeline. Every produced rule is rescored by replaying it
//! against all training pairs; weak rules are dropped.

use std::collections::BTreeMap;

use crate::schema::{Axis, Example, Grid, RuleKind, TransformationRule};

use super::oracle;

/// Rules scoring below this after replay are discarded.
pub const CONFIDENCE_FLOOR: f32 = 0.5;

/// Discover candidate rules from training pairs, rescored across all
/// pairs and sorted by descending confidence.
pub fn discover(examples: &[Example]) -> Vec<TransformationRule> {
    let mut rules: Vec<TransformationRule> = Vec::new();
    let mut push = |rules: &mut Vec<TransformationRule>, rule: TransformationRule| {
        if !rules.iter().any(|r| r.kind == rule.kind) {
            rules.push(rule);
        }
    };

    for example in examples {
        if let Some(rule) = try_translation(example) {
            push(&mut rules, rule);
        }
        if let Some(rule) = try_rotation(example) {
            push(&mut rules, rule);
        }
        if let Some(rule) = try_reflection(example) {
            push(&mut rules, rule);
        }
        if let Some(rule) = try_color_map(example) {
            push(&mut rules, rule);
        }
        if let Some(rule) = try_symmetry(example) {
            push(&mut rules, rule);
        }
        if let Some(rule) = try_connectivity(example) {
            push(&mut rules, rule);
        }
        if let Some(rule) = try_pattern_fill(example) {
            push(&mut rules, rule);
        }
    }

    for rule in &mut rules {
        rule.confidence = oracle::consistency_score(rule, examples);
    }
    rules.retain(|r| r.confidence >= CONFIDENCE_FLOOR);
    rules.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    rules
}

/// Equal object counts with matching pairwise centroid deltas read as a
/// translation of the whole scene.
fn try_translation(example: &Example) -> Option<TransformationRule> {
    let input_objects = example.input.color_objects();
    let output_objects = example.output.color_objects();

    if input_objects.is_empty() || input_objects.len() != output_objects.len() {
        return None;
    }

    let mut dx = 0.0f32;
    let mut dy = 0.0f32;
    for (a, b) in input_objects.iter().zip(output_objects.iter()) {
        dx += b.centroid.0 - a.centroid.0;
        dy += b.centroid.1 - a.centroid.1;
    }
    dx /= input_objects.len() as f32;
    dy /= input_objects.len() as f32;

    if (dx * dx + dy * dy).sqrt() <= 0.1 {
        return None;
    }

    Some(TransformationRule::new(
        RuleKind::Translation {
            dx: dx.round() as i32,
            dy: dy.round() as i32,
        },
        0.8,
    ))
}

/// Output equals the input rotated by some number of quarter turns.
fn try_rotation(example: &Example) -> Option<TransformationRule> {
    for quarter_turns in 1..4u8 {
        let rule = TransformationRule::new(RuleKind::Rotation { quarter_turns }, 0.8);
        if rule.apply(&example.input) == example.output {
            return Some(rule);
        }
    }
    None
}

/// Output equals the input mirrored about one axis.
fn try_reflection(example: &Example) -> Option<TransformationRule> {
    for axis in [Axis::Horizontal, Axis::Vertical, Axis::Diagonal] {
        let rule = TransformationRule::new(RuleKind::Reflection { axis }, 0.8);
        let reflected = rule.apply(&example.input);
        if reflected == example.output && reflected != example.input {
            return Some(rule);
        }
    }
    None
}

/// A conflict-free symbol substitution across overlapping cells.
fn try_color_map(example: &Example) -> Option<TransformationRule> {
    if example.input.width() != example.output.width()
        || example.input.height() != example.output.height()
    {
        return None;
    }

    let mut map = BTreeMap::new();
    for (x, y, from) in example.input.iter_cells() {
        let to = example.output.get(x as i32, y as i32);
        if from == to {
            continue;
        }
        match map.get(&from) {
            None => {
                map.insert(from, to);
            }
            Some(&existing) if existing == to => {}
            Some(_) => return None, // inconsistent substitution
        }
    }

    if map.is_empty() {
        return None;
    }

    Some(TransformationRule::new(RuleKind::ColorMap { map }, 0.7))
}

/// Output grids that are mirror-symmetric read as symmetry completion.
fn try_symmetry(example: &Example) -> Option<TransformationRule> {
    let mut axes = Vec::new();
    if example.output.has_horizontal_symmetry() {
        axes.push(Axis::Horizontal);
    }
    if example.output.has_vertical_symmetry() {
        axes.push(Axis::Vertical);
    }
    if example.output.has_diagonal_symmetry() {
        axes.push(Axis::Diagonal);
    }

    if axes.is_empty() || example.output == example.input {
        return None;
    }

    Some(TransformationRule::new(RuleKind::Symmetry { axes }, 0.9))
}

/// Fewer connected components in the output read as bridge formation.
fn try_connectivity(example: &Example) -> Option<TransformationRule> {
    let input_components = example.input.connected_components();
    let output_components = example.output.connected_components();

    if input_components.len() < 2 || output_components.len() >= input_components.len() {
        return None;
    }

    // Bridge color: modal color of cells the output added.
    let mut counts = [0usize; crate::schema::PALETTE_SIZE];
    for (x, y, value) in example.output.iter_cells() {
        if value != 0 && example.input.get(x as i32, y as i32) == 0 {
            counts[value as usize] += 1;
        }
    }
    let color = counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, &c)| c)
        .filter(|&(_, &c)| c > 0)
        .map(|(color, _)| color as i32)
        .or_else(|| {
            input_components
                .first()
                .map(|c| example.input.get(c[0].0, c[0].1))
        })?;

    Some(TransformationRule::new(
        RuleKind::Connectivity { color },
        0.75,
    ))
}

/// Background regions replaced by a perfect tiling of a small block.
fn try_pattern_fill(example: &Example) -> Option<TransformationRule> {
    let input = &example.input;
    let output = &example.output;
    if input.width() != output.width() || input.height() != output.height() {
        return None;
    }
    if input == output {
        return None;
    }

    // The fill must preserve every foreground input cell.
    for (x, y, value) in input.iter_cells() {
        if value != 0 && output.get(x as i32, y as i32) != value {
            return None;
        }
    }

    let block = smallest_tile(output)?;
    if block.width() == output.width() && block.height() == output.height() {
        return None; // no repetition, just an arbitrary output
    }

    Some(TransformationRule::new(RuleKind::PatternFill { block }, 0.85))
}

/// Smallest block that tiles the grid exactly, if any.
fn smallest_tile(grid: &Grid) -> Option<Grid> {
    let (w, h) = (grid.width(), grid.height());

    for bh in 1..=h {
        if h % bh != 0 {
            continue;
        }
        for bw in 1..=w {
            if w % bw != 0 {
                continue;
            }
            let tiles = (0..h).all(|y| {
                (0..w).all(|x| {
                    grid.get(x as i32, y as i32)
                        == grid.get((x % bw) as i32, (y % bh) as i32)
                })
            });
            if tiles {
                let mut block = Grid::new(bw, bh);
                for y in 0..bh {
                    for x in 0..bw {
                        block.set(x as i32, y as i32, grid.get(x as i32, y as i32));
                    }
                }
                return Some(block);
            }
        }
    }

    None
}
