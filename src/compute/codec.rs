//! Grid <-> particle pattern codec.
//!
//! Maps each non-background cell of a grid to a particle with a spatial
//! position and a spectral value, and decodes a particle population back
//! into a grid. Colors are bijective with wavelengths via nearest match.

use glam::Vec3;

use crate::schema::{Grid, PALETTE_SIZE};

/// Simulation units per grid cell.
pub const GRID_SCALE: f32 = 100.0;

/// Z spacing between consecutive pattern layers.
pub const LAYER_SPACING: f32 = 500.0;

/// Wavelengths (meters) assigned to the 10 palette symbols.
const WAVELENGTHS: [f32; PALETTE_SIZE] = [
    700e-9, // 0 background
    450e-9, // 1 blue
    650e-9, // 2 red
    550e-9, // 3 green
    590e-9, // 4 yellow
    480e-9, // 5 grey
    600e-9, // 6 magenta
    610e-9, // 7 orange
    460e-9, // 8 light blue
    520e-9, // 9 brown
];

/// Which side of a training pair a pattern came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternLayer {
    Input,
    Output,
}

/// Flat particle pattern produced by [`encode`].
#[derive(Debug, Clone)]
pub struct ParticlePattern {
    pub positions: Vec<Vec3>,
    pub wavelengths: Vec<f32>,
    pub intensities: Vec<f32>,
    /// Originating cell index (y * width + x) per particle.
    pub cell_indices: Vec<usize>,
    /// Index of the training example this pattern belongs to.
    pub example: usize,
    pub layer: PatternLayer,
}

impl ParticlePattern {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Wavelength for a palette symbol. Out-of-palette symbols clamp to background.
pub fn wavelength_for(color: i32) -> f32 {
    WAVELENGTHS[color.clamp(0, PALETTE_SIZE as i32 - 1) as usize]
}

/// Nearest-match palette symbol for a wavelength.
pub fn color_for(wavelength: f32) -> i32 {
    let mut best = 0;
    let mut best_diff = f32::MAX;
    for (color, &w) in WAVELENGTHS.iter().enumerate() {
        let diff = (wavelength - w).abs();
        if diff < best_diff {
            best_diff = diff;
            best = color;
        }
    }
    best as i32
}

/// Z coordinate of a pattern layer: inputs and outputs of example k sit at
/// 2k and 2k+1 layer slots.
pub fn layer_z(example: usize, layer: PatternLayer) -> f32 {
    let slot = 2 * example
        + match layer {
            PatternLayer::Input => 0,
            PatternLayer::Output => 1,
        };
    slot as f32 * LAYER_SPACING
}

/// Encode every non-background cell as a particle.
pub fn encode(grid: &Grid, example: usize, layer: PatternLayer) -> ParticlePattern {
    let z = layer_z(example, layer);
    let mut pattern = ParticlePattern {
        positions: Vec::new(),
        wavelengths: Vec::new(),
        intensities: Vec::new(),
        cell_indices: Vec::new(),
        example,
        layer,
    };

    for (x, y, color) in grid.iter_cells() {
        if color == 0 {
            continue;
        }
        pattern
            .positions
            .push(Vec3::new(x as f32 * GRID_SCALE, y as f32 * GRID_SCALE, z));
        pattern.wavelengths.push(wavelength_for(color));
        pattern.intensities.push(1.0 + color as f32 * 0.1);
        pattern.cell_indices.push(y * grid.width() + x);
    }

    pattern
}

/// Decode a particle population back into a grid of the given dimensions.
/// Particles that round outside the grid are dropped; uncovered cells stay
/// background.
pub fn decode(
    particles: impl Iterator<Item = (Vec3, f32)>,
    width: usize,
    height: usize,
) -> Grid {
    let mut grid = Grid::new(width, height);

    for (position, wavelength) in particles {
        let x = (position.x / GRID_SCALE).round() as i32;
        let y = (position.y / GRID_SCALE).round() as i32;
        if x >= 0 && (x as usize) < width && y >= 0 && (y as usize) < height {
            grid.set(x, y, color_for(wavelength));
        }
    }

    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wavelengths_are_bijective() {
        for color in 0..PALETTE_SIZE as i32 {
            assert_eq!(color_for(wavelength_for(color)), color);
        }
    }

    #[test]
    fn test_encode_skips_background() {
        let grid = Grid::from_rows(vec![vec![0, 3], vec![0, 0]]).unwrap();
        let pattern = encode(&grid, 0, PatternLayer::Input);
        assert_eq!(pattern.len(), 1);
        assert_eq!(pattern.positions[0], Vec3::new(GRID_SCALE, 0.0, 0.0));
        assert_eq!(pattern.cell_indices[0], 1);
    }

    #[test]
    fn test_round_trip_all_palette_values() {
        let grid = Grid::from_rows(vec![
            vec![0, 1, 2, 3, 4],
            vec![5, 6, 7, 8, 9],
        ])
        .unwrap();
        let pattern = encode(&grid, 0, PatternLayer::Input);
        let decoded = decode(
            pattern
                .positions
                .iter()
                .copied()
                .zip(pattern.wavelengths.iter().copied()),
            grid.width(),
            grid.height(),
        );
        assert_eq!(decoded, grid);
    }

    #[test]
    fn test_decode_drops_out_of_range() {
        let particles = vec![
            (Vec3::new(-500.0, 0.0, 0.0), wavelength_for(1)),
            (Vec3::new(0.0, 0.0, 0.0), wavelength_for(2)),
        ];
        let grid = decode(particles.into_iter(), 2, 2);
        assert_eq!(grid.get(0, 0), 2);
        assert_eq!(grid.active_cells(), 1);
    }

    #[test]
    fn test_layer_z_interleaves_examples() {
        assert_eq!(layer_z(0, PatternLayer::Input), 0.0);
        assert_eq!(layer_z(0, PatternLayer::Output), LAYER_SPACING);
        assert_eq!(layer_z(1, PatternLayer::Input), 2.0 * LAYER_SPACING);
    }
}
