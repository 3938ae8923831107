//! Grid and task types for colored-grid transformation puzzles.

use serde::{Deserialize, Serialize};

/// Sentinel returned by [`Grid::get`] for out-of-bounds access.
pub const INVALID_CELL: i32 = -1;

/// Number of symbols in the palette (0..=9, 0 is background).
pub const PALETTE_SIZE: usize = 10;

/// Rectangular grid of palette symbols. Immutable once constructed, except
/// through [`Grid::set`] during rule application.
///
/// Serializes as nested arrays of integers; malformed input (ragged rows,
/// out-of-palette symbols) is rejected at deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<i32>>", into = "Vec<Vec<i32>>")]
pub struct Grid {
    cells: Vec<i32>,
    width: usize,
    height: usize,
}

impl Grid {
    /// Create a grid filled with background (0).
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            cells: vec![0; width * height],
            width,
            height,
        }
    }

    /// Build from row-major nested arrays, validating shape and palette.
    pub fn from_rows(rows: Vec<Vec<i32>>) -> Result<Self, GridError> {
        if rows.is_empty() || rows[0].is_empty() {
            return Err(GridError::Empty);
        }
        let width = rows[0].len();
        let height = rows.len();
        let mut cells = Vec::with_capacity(width * height);

        for (y, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::RaggedRow {
                    row: y,
                    expected: width,
                    got: row.len(),
                });
            }
            for (x, &value) in row.iter().enumerate() {
                if !(0..PALETTE_SIZE as i32).contains(&value) {
                    return Err(GridError::InvalidSymbol { x, y, value });
                }
                cells.push(value);
            }
        }

        Ok(Self {
            cells,
            width,
            height,
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cell value at (x, y), or [`INVALID_CELL`] when out of bounds.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> i32 {
        if x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height {
            self.cells[y as usize * self.width + x as usize]
        } else {
            INVALID_CELL
        }
    }

    /// Write a cell; out-of-bounds writes are silently dropped.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, value: i32) {
        if x >= 0 && (x as usize) < self.width && y >= 0 && (y as usize) < self.height {
            self.cells[y as usize * self.width + x as usize] = value;
        }
    }

    /// Iterate all cells as (x, y, value).
    pub fn iter_cells(&self) -> impl Iterator<Item = (usize, usize, i32)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, &v)| (i % self.width, i / self.width, v))
    }

    /// Number of non-background cells.
    pub fn active_cells(&self) -> usize {
        self.cells.iter().filter(|&&v| v != 0).count()
    }

    /// Fraction of cells that match exactly; 0.0 when dimensions differ.
    pub fn match_fraction(&self, other: &Grid) -> f32 {
        if self.width != other.width || self.height != other.height {
            return 0.0;
        }
        let matches = self
            .cells
            .iter()
            .zip(other.cells.iter())
            .filter(|(a, b)| a == b)
            .count();
        matches as f32 / self.cells.len() as f32
    }

    /// Connected components of non-background cells (4-connectivity, any
    /// color). Each component is a list of (x, y) coordinates.
    pub fn connected_components(&self) -> Vec<Vec<(i32, i32)>> {
        self.flood_regions(|a, b| a != 0 && b != 0)
    }

    /// Same-color objects (4-connected regions of a single symbol).
    pub fn color_objects(&self) -> Vec<ColorObject> {
        self.flood_regions(|a, b| a != 0 && a == b)
            .into_iter()
            .map(|cells| {
                let color = self.get(cells[0].0, cells[0].1);
                let n = cells.len() as f32;
                let (sx, sy) = cells
                    .iter()
                    .fold((0.0f32, 0.0f32), |(sx, sy), &(x, y)| {
                        (sx + x as f32, sy + y as f32)
                    });
                ColorObject {
                    color,
                    cells,
                    centroid: (sx / n, sy / n),
                }
            })
            .collect()
    }

    fn flood_regions(&self, linked: impl Fn(i32, i32) -> bool) -> Vec<Vec<(i32, i32)>> {
        let mut visited = vec![false; self.cells.len()];
        let mut regions = Vec::new();

        for start_y in 0..self.height as i32 {
            for start_x in 0..self.width as i32 {
                let idx = start_y as usize * self.width + start_x as usize;
                if visited[idx] || self.get(start_x, start_y) == 0 {
                    continue;
                }
                let seed = self.get(start_x, start_y);
                let mut region = Vec::new();
                let mut queue = vec![(start_x, start_y)];
                visited[idx] = true;

                while let Some((x, y)) = queue.pop() {
                    region.push((x, y));
                    for (nx, ny) in [(x + 1, y), (x - 1, y), (x, y + 1), (x, y - 1)] {
                        let v = self.get(nx, ny);
                        if v == INVALID_CELL || !linked(seed, v) {
                            continue;
                        }
                        let nidx = ny as usize * self.width + nx as usize;
                        if !visited[nidx] {
                            visited[nidx] = true;
                            queue.push((nx, ny));
                        }
                    }
                }
                regions.push(region);
            }
        }

        regions
    }

    /// Mirror symmetry across the horizontal axis (top half equals bottom half).
    pub fn has_horizontal_symmetry(&self) -> bool {
        for y in 0..self.height as i32 / 2 {
            for x in 0..self.width as i32 {
                if self.get(x, y) != self.get(x, self.height as i32 - 1 - y) {
                    return false;
                }
            }
        }
        true
    }

    /// Mirror symmetry across the vertical axis (left half equals right half).
    pub fn has_vertical_symmetry(&self) -> bool {
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 / 2 {
                if self.get(x, y) != self.get(self.width as i32 - 1 - x, y) {
                    return false;
                }
            }
        }
        true
    }

    /// Symmetry across the main diagonal. Square grids only.
    pub fn has_diagonal_symmetry(&self) -> bool {
        if self.width != self.height {
            return false;
        }
        for y in 0..self.height as i32 {
            for x in 0..y {
                if self.get(x, y) != self.get(y, x) {
                    return false;
                }
            }
        }
        true
    }
}

impl TryFrom<Vec<Vec<i32>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<i32>>) -> Result<Self, Self::Error> {
        Grid::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<i32>> {
    fn from(grid: Grid) -> Self {
        (0..grid.height)
            .map(|y| grid.cells[y * grid.width..(y + 1) * grid.width].to_vec())
            .collect()
    }
}

/// A same-color connected region with its centroid in cell coordinates.
#[derive(Debug, Clone)]
pub struct ColorObject {
    pub color: i32,
    pub cells: Vec<(i32, i32)>,
    pub centroid: (f32, f32),
}

/// Grid construction/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("grid must have at least one row and one column")]
    Empty,
    #[error("row {row} has {got} cells, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        got: usize,
    },
    #[error("symbol {value} at ({x}, {y}) is outside the palette")]
    InvalidSymbol { x: usize, y: usize, value: i32 },
}

/// A training pair: known input and output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Example {
    pub input: Grid,
    pub output: Grid,
}

/// A test case: input only. The output is present only in offline corpora
/// used for parameter evolution and is never read by the solve path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestExample {
    pub input: Grid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Grid>,
}

/// A complete puzzle task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    #[serde(alias = "train")]
    pub training_examples: Vec<Example>,
    #[serde(alias = "test")]
    pub test_examples: Vec<TestExample>,
}
