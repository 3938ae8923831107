//! Typed grid transformation rules.
//!
//! A rule is a tagged variant carrying only the parameters relevant to its
//! kind, plus a confidence score assigned by cross-example replay. Rules are
//! applied with exhaustive matching; there is no escape-hatch callback.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::grid::Grid;

/// Mirror axis for reflections and symmetry completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Axis {
    /// Across the horizontal axis: rows flip top to bottom.
    Horizontal,
    /// Across the vertical axis: columns flip left to right.
    Vertical,
    /// Across the main diagonal (square grids).
    Diagonal,
}

/// Transformation variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RuleKind {
    /// Shift every cell by (dx, dy).
    Translation { dx: i32, dy: i32 },
    /// Rotate clockwise by a multiple of 90 degrees.
    Rotation { quarter_turns: u8 },
    /// Mirror the whole grid across an axis.
    Reflection { axis: Axis },
    /// Symbol-to-symbol substitution.
    ColorMap { map: BTreeMap<i32, i32> },
    /// Complete the grid so it becomes symmetric about the given axes,
    /// mirroring the leading half onto the trailing half.
    Symmetry { axes: Vec<Axis> },
    /// Bridge disconnected components with straight lines of `color`.
    Connectivity { color: i32 },
    /// Fill background cells by tiling a repeating block.
    PatternFill { block: Grid },
    /// No detected transformation.
    None,
}

/// A transformation rule with its replay confidence in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformationRule {
    pub kind: RuleKind,
    pub confidence: f32,
}

impl TransformationRule {
    pub fn new(kind: RuleKind, confidence: f32) -> Self {
        Self {
            kind,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The identity rule, returned when nothing better is known.
    pub fn none() -> Self {
        Self {
            kind: RuleKind::None,
            confidence: 0.0,
        }
    }

    /// Apply the rule to a grid, producing a new grid.
    pub fn apply(&self, input: &Grid) -> Grid {
        match &self.kind {
            RuleKind::Translation { dx, dy } => apply_translation(input, *dx, *dy),
            RuleKind::Rotation { quarter_turns } => {
                let mut out = input.clone();
                for _ in 0..(*quarter_turns % 4) {
                    out = rotate_quarter(&out);
                }
                out
            }
            RuleKind::Reflection { axis } => apply_reflection(input, *axis),
            RuleKind::ColorMap { map } => apply_color_map(input, map),
            RuleKind::Symmetry { axes } => apply_symmetry(input, axes),
            RuleKind::Connectivity { color } => apply_connectivity(input, *color),
            RuleKind::PatternFill { block } => apply_pattern_fill(input, block),
            RuleKind::None => input.clone(),
        }
    }
}

impl fmt::Display for TransformationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            RuleKind::Translation { dx, dy } => write!(f, "translate({dx}, {dy})"),
            RuleKind::Rotation { quarter_turns } => {
                write!(f, "rotate({}deg)", u32::from(*quarter_turns) * 90)
            }
            RuleKind::Reflection { axis } => write!(f, "reflect({axis:?})"),
            RuleKind::ColorMap { map } => write!(f, "colormap({} entries)", map.len()),
            RuleKind::Symmetry { axes } => write!(f, "symmetry({axes:?})"),
            RuleKind::Connectivity { color } => write!(f, "connect(color {color})"),
            RuleKind::PatternFill { block } => {
                write!(f, "fill({}x{} block)", block.width(), block.height())
            }
            RuleKind::None => write!(f, "identity"),
        }?;
        write!(f, " @ {:.2}", self.confidence)
    }
}

fn apply_translation(input: &Grid, dx: i32, dy: i32) -> Grid {
    let mut out = Grid::new(input.width(), input.height());
    for (x, y, value) in input.iter_cells() {
        out.set(x as i32 + dx, y as i32 + dy, value);
    }
    out
}

fn rotate_quarter(input: &Grid) -> Grid {
    let mut out = Grid::new(input.height(), input.width());
    for (x, y, value) in input.iter_cells() {
        out.set(input.height() as i32 - 1 - y as i32, x as i32, value);
    }
    out
}

fn apply_reflection(input: &Grid, axis: Axis) -> Grid {
    let (w, h) = (input.width() as i32, input.height() as i32);
    match axis {
        Axis::Horizontal => {
            let mut out = Grid::new(input.width(), input.height());
            for (x, y, value) in input.iter_cells() {
                out.set(x as i32, h - 1 - y as i32, value);
            }
            out
        }
        Axis::Vertical => {
            let mut out = Grid::new(input.width(), input.height());
            for (x, y, value) in input.iter_cells() {
                out.set(w - 1 - x as i32, y as i32, value);
            }
            out
        }
        Axis::Diagonal => {
            let mut out = Grid::new(input.height(), input.width());
            for (x, y, value) in input.iter_cells() {
                out.set(y as i32, x as i32, value);
            }
            out
        }
    }
}

fn apply_color_map(input: &Grid, map: &BTreeMap<i32, i32>) -> Grid {
    let mut out = input.clone();
    for (x, y, value) in input.iter_cells() {
        if let Some(&mapped) = map.get(&value) {
            out.set(x as i32, y as i32, mapped);
        }
    }
    out
}

fn apply_symmetry(input: &Grid, axes: &[Axis]) -> Grid {
    let mut out = input.clone();
    let (w, h) = (input.width() as i32, input.height() as i32);

    for axis in axes {
        match axis {
            Axis::Horizontal => {
                for y in 0..h / 2 {
                    for x in 0..w {
                        let value = out.get(x, y);
                        out.set(x, h - 1 - y, value);
                    }
                }
            }
            Axis::Vertical => {
                for y in 0..h {
                    for x in 0..w / 2 {
                        let value = out.get(x, y);
                        out.set(w - 1 - x, y, value);
                    }
                }
            }
            Axis::Diagonal => {
                if w == h {
                    for y in 0..h {
                        for x in 0..y {
                            let value = out.get(x, y);
                            out.set(y, x, value);
                        }
                    }
                }
            }
        }
    }

    out
}

fn apply_connectivity(input: &Grid, color: i32) -> Grid {
    let mut out = input.clone();
    let components = input.connected_components();

    let centers: Vec<(i32, i32)> = components
        .iter()
        .map(|cells| {
            let n = cells.len() as i32;
            let (sx, sy) = cells.iter().fold((0, 0), |(sx, sy), &(x, y)| (sx + x, sy + y));
            (sx / n, sy / n)
        })
        .collect();

    for i in 0..centers.len() {
        for j in (i + 1)..centers.len() {
            draw_line(&mut out, centers[i], centers[j], color);
        }
    }

    out
}

/// Bresenham rasterization between two cells.
pub fn draw_line(grid: &mut Grid, start: (i32, i32), end: (i32, i32), color: i32) {
    let (mut x0, mut y0) = start;
    let (x1, y1) = end;

    let dx = (x1 - x0).abs();
    let dy = (y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx - dy;

    loop {
        grid.set(x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x0 += sx;
        }
        if e2 < dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn apply_pattern_fill(input: &Grid, block: &Grid) -> Grid {
    let mut out = input.clone();
    let (bw, bh) = (block.width() as i32, block.height() as i32);
    if bw == 0 || bh == 0 {
        return out;
    }
    for (x, y, value) in input.iter_cells() {
        if value == 0 {
            out.set(x as i32, y as i32, block.get(x as i32 % bw, y as i32 % bh));
        }
    }
    out
}
