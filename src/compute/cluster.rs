//! Cluster extraction: grouping coherent particles into transformation
//! hypotheses.
//!
//! Clusters are transient index sets over the particle arena, recomputed
//! from scratch each cycle. A particle belongs to at most one cluster per
//! cycle.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::schema::{Axis, SolverConfig};

use super::codec::{GRID_SCALE, PatternLayer, color_for};
use super::field::Particle;

/// A coherent group of particles with derived kinematic aggregates.
#[derive(Debug, Clone)]
pub struct Cluster {
    /// Arena indices of member particles.
    pub members: Vec<usize>,
    /// Luminosity-weighted centroid.
    pub centroid: Vec3,
    /// Component-wise half-extent around the centroid.
    pub extents: Vec3,
    pub mean_velocity: Vec3,
    /// Angular momentum about z through the centroid, normalized by the
    /// moment of inertia.
    pub angular_momentum: f32,
    /// 1 / (1 + positional variance in cell units); 1.0 for a point cluster.
    pub spatial_coherence: f32,
    /// Best mirror-match fraction over the tested axes.
    pub symmetry_score: f32,
    /// Axes whose mirror-match fraction is at least 0.9.
    pub symmetry_axes: Vec<Axis>,
    /// Consistent input-layer to output-layer color shifts observed among
    /// members sharing an originating cell.
    pub spectral_shifts: BTreeMap<i32, i32>,
    /// Number of member pairs supporting `spectral_shifts`.
    pub spectral_shift_support: usize,
    /// Total number of input/output member pairs examined.
    pub spectral_pairs: usize,
    /// Member activations in cell-index order, for periodicity analysis.
    pub activation_sequence: Vec<f32>,
}

/// Partition eligible particles into proximity groups (BFS over pairs
/// closer than `radius`). Shared by the extractor and diversity pressure.
pub fn proximity_partition(
    particles: &[Particle],
    radius: f32,
    eligible: impl Fn(&Particle) -> bool,
) -> Vec<Vec<usize>> {
    let indices: Vec<usize> = particles
        .iter()
        .enumerate()
        .filter(|(_, p)| p.active && eligible(p))
        .map(|(i, _)| i)
        .collect();

    let radius_sq = radius * radius;
    let mut assigned = vec![false; indices.len()];
    let mut groups = Vec::new();

    for start in 0..indices.len() {
        if assigned[start] {
            continue;
        }
        let mut group = Vec::new();
        let mut queue = vec![start];
        assigned[start] = true;

        while let Some(local) = queue.pop() {
            group.push(indices[local]);
            let here = particles[indices[local]].position;
            for (other, &idx) in indices.iter().enumerate() {
                if !assigned[other]
                    && particles[idx].position.distance_squared(here) <= radius_sq
                {
                    assigned[other] = true;
                    queue.push(other);
                }
            }
        }

        groups.push(group);
    }

    groups
}

/// Extracts clusters from the active particle set each cycle.
pub struct ClusterExtractor {
    config: SolverConfig,
}

impl ClusterExtractor {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Group bright particles and annotate each group with its aggregates.
    /// Groups under the minimum member count are dropped.
    pub fn extract(&self, particles: &[Particle]) -> Vec<Cluster> {
        let threshold = self.config.activation_threshold;
        let groups = proximity_partition(particles, self.config.link_radius, |p| {
            p.luminosity >= threshold
        });

        groups
            .into_iter()
            .filter(|g| g.len() >= self.config.min_cluster_size)
            .map(|members| annotate(members, particles))
            .collect()
    }
}

fn annotate(mut members: Vec<usize>, particles: &[Particle]) -> Cluster {
    members.sort_by_key(|&i| (particles[i].example, particles[i].cell_index));

    let total_mass: f32 = members.iter().map(|&i| particles[i].luminosity).sum();
    let total_mass = total_mass.max(1e-6);

    let centroid = members
        .iter()
        .map(|&i| particles[i].position * particles[i].luminosity)
        .sum::<Vec3>()
        / total_mass;

    let mut extents = Vec3::ZERO;
    for &i in &members {
        let offset = (particles[i].position - centroid).abs();
        extents = extents.max(offset);
    }

    let mean_velocity =
        members.iter().map(|&i| particles[i].velocity).sum::<Vec3>() / members.len() as f32;

    // Angular momentum about z, weighted by luminosity and normalized by
    // the in-plane moment of inertia.
    let mut lz = 0.0f32;
    let mut inertia = 0.0f32;
    let mut variance = 0.0f32;
    for &i in &members {
        let p = &particles[i];
        let r = p.position - centroid;
        let v = p.velocity - mean_velocity;
        lz += p.luminosity * (r.x * v.y - r.y * v.x);
        inertia += p.luminosity * (r.x * r.x + r.y * r.y);
        variance += p.luminosity * r.length_squared();
    }
    let angular_momentum = if inertia > 1e-6 { lz / inertia } else { 0.0 };

    let variance_cells = variance / total_mass / (GRID_SCALE * GRID_SCALE);
    let spatial_coherence = 1.0 / (1.0 + variance_cells);

    let (symmetry_score, symmetry_axes) = symmetry_analysis(&members, particles, centroid);
    let (spectral_shifts, spectral_shift_support, spectral_pairs) =
        spectral_analysis(&members, particles);

    let activation_sequence = members.iter().map(|&i| particles[i].activation).collect();

    Cluster {
        members,
        centroid,
        extents,
        mean_velocity,
        angular_momentum,
        spatial_coherence,
        symmetry_score,
        symmetry_axes,
        spectral_shifts,
        spectral_shift_support,
        spectral_pairs,
        activation_sequence,
    }
}

/// Mirror-match fraction of member positions about the centroid, per axis.
fn symmetry_analysis(
    members: &[usize],
    particles: &[Particle],
    centroid: Vec3,
) -> (f32, Vec<Axis>) {
    let tolerance = GRID_SCALE * 0.5;
    let offsets: Vec<Vec3> = members
        .iter()
        .map(|&i| particles[i].position - centroid)
        .collect();

    let score_for = |mirror: &dyn Fn(Vec3) -> Vec3| -> f32 {
        let mut matched = 0usize;
        for &offset in &offsets {
            let target = mirror(offset);
            if offsets
                .iter()
                .any(|&other| other.distance(target) <= tolerance)
            {
                matched += 1;
            }
        }
        matched as f32 / offsets.len() as f32
    };

    let candidates: [(Axis, f32); 3] = [
        (Axis::Horizontal, score_for(&|o| Vec3::new(o.x, -o.y, o.z))),
        (Axis::Vertical, score_for(&|o| Vec3::new(-o.x, o.y, o.z))),
        (Axis::Diagonal, score_for(&|o| Vec3::new(o.y, o.x, o.z))),
    ];

    let best = candidates
        .iter()
        .map(|(_, s)| *s)
        .fold(0.0f32, f32::max);
    let axes = candidates
        .iter()
        .filter(|(_, s)| *s >= 0.9)
        .map(|(a, _)| *a)
        .collect();

    (best, axes)
}

/// Pair input-layer and output-layer members that originated from the same
/// grid cell and derive a modal color shift per input color.
fn spectral_analysis(
    members: &[usize],
    particles: &[Particle],
) -> (BTreeMap<i32, i32>, usize, usize) {
    let mut by_cell: BTreeMap<(usize, usize), (Option<i32>, Option<i32>)> = BTreeMap::new();

    for &i in members {
        let p = &particles[i];
        let entry = by_cell.entry((p.example, p.cell_index)).or_default();
        let color = color_for(p.wavelength);
        match p.layer {
            PatternLayer::Input => entry.0 = Some(color),
            PatternLayer::Output => entry.1 = Some(color),
        }
    }

    // Vote per input color for its modal output color.
    let mut votes: BTreeMap<i32, BTreeMap<i32, usize>> = BTreeMap::new();
    let mut pairs = 0usize;
    for (from, to) in by_cell.values().filter_map(|&(f, t)| f.zip(t)) {
        *votes.entry(from).or_default().entry(to).or_default() += 1;
        pairs += 1;
    }

    let mut shifts = BTreeMap::new();
    let mut support = 0usize;
    for (from, outcomes) in votes {
        if let Some((&to, &count)) = outcomes.iter().max_by_key(|&(_, &c)| c) {
            support += count;
            if to != from {
                shifts.insert(from, to);
            }
        }
    }

    (shifts, support, pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::codec::wavelength_for;
    use std::collections::HashSet;

    fn particle(x: f32, y: f32, luminosity: f32) -> Particle {
        Particle {
            position: Vec3::new(x, y, 0.0),
            velocity: Vec3::ZERO,
            wavelength: wavelength_for(1),
            luminosity,
            energy: 1.0,
            activation: 0.0,
            cell_index: 0,
            example: 0,
            layer: PatternLayer::Input,
            age: 1.0,
            active: true,
        }
    }

    fn default_extractor() -> ClusterExtractor {
        ClusterExtractor::new(&SolverConfig {
            min_cluster_size: 2,
            ..Default::default()
        })
    }

    #[test]
    fn test_partition_is_strict() {
        // Two groups far apart; membership must not overlap.
        let mut particles = Vec::new();
        for i in 0..4 {
            particles.push(particle(i as f32 * 50.0, 0.0, 2.0));
        }
        for i in 0..4 {
            particles.push(particle(5000.0 + i as f32 * 50.0, 0.0, 2.0));
        }

        let clusters = default_extractor().extract(&particles);
        assert_eq!(clusters.len(), 2);

        let mut seen = HashSet::new();
        for cluster in &clusters {
            for &m in &cluster.members {
                assert!(seen.insert(m), "particle {m} assigned twice");
            }
        }
    }

    #[test]
    fn test_small_groups_dropped() {
        let particles = vec![particle(0.0, 0.0, 2.0)];
        let clusters = default_extractor().extract(&particles);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_dim_particles_excluded() {
        let particles = vec![
            particle(0.0, 0.0, 0.1),
            particle(50.0, 0.0, 0.1),
            particle(100.0, 0.0, 0.1),
        ];
        let clusters = default_extractor().extract(&particles);
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_centroid_and_velocity() {
        let mut a = particle(0.0, 0.0, 2.0);
        let mut b = particle(100.0, 0.0, 2.0);
        a.velocity = Vec3::new(1.0, 0.0, 0.0);
        b.velocity = Vec3::new(3.0, 0.0, 0.0);

        let clusters = default_extractor().extract(&[a, b]);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert!((cluster.centroid.x - 50.0).abs() < 1e-3);
        assert!((cluster.mean_velocity.x - 2.0).abs() < 1e-6);
    }

    #[test]
    fn test_rotating_cluster_has_angular_momentum() {
        // Four particles on a circle with tangential velocities.
        let mut particles = Vec::new();
        for (x, y, vx, vy) in [
            (100.0, 0.0, 0.0, 1.0),
            (-100.0, 0.0, 0.0, -1.0),
            (0.0, 100.0, -1.0, 0.0),
            (0.0, -100.0, 1.0, 0.0),
        ] {
            let mut p = particle(x, y, 2.0);
            p.velocity = Vec3::new(vx, vy, 0.0);
            particles.push(p);
        }

        let clusters = default_extractor().extract(&particles);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].angular_momentum > 1e-3);
    }

    #[test]
    fn test_point_cluster_is_fully_coherent() {
        let particles = vec![particle(10.0, 10.0, 2.0), particle(10.0, 10.0, 2.0)];
        let clusters = default_extractor().extract(&particles);
        assert!(clusters[0].spatial_coherence > 0.99);
    }

    #[test]
    fn test_symmetric_cluster_detected() {
        // Mirror pairs across the horizontal axis.
        let particles = vec![
            particle(0.0, 60.0, 2.0),
            particle(0.0, -60.0, 2.0),
            particle(80.0, 60.0, 2.0),
            particle(80.0, -60.0, 2.0),
        ];
        let clusters = default_extractor().extract(&particles);
        assert_eq!(clusters.len(), 1);
        assert!(clusters[0].symmetry_score >= 0.9);
        assert!(clusters[0].symmetry_axes.contains(&Axis::Horizontal));
    }

    #[test]
    fn test_spectral_shift_from_layer_pairs() {
        let mut particles = Vec::new();
        for cell in 0..3 {
            let mut input = particle(cell as f32 * 30.0, 0.0, 2.0);
            input.cell_index = cell;
            input.wavelength = wavelength_for(3);
            let mut output = particle(cell as f32 * 30.0, 40.0, 2.0);
            output.cell_index = cell;
            output.layer = PatternLayer::Output;
            output.wavelength = wavelength_for(7);
            particles.push(input);
            particles.push(output);
        }

        let clusters = default_extractor().extract(&particles);
        assert_eq!(clusters.len(), 1);
        let cluster = &clusters[0];
        assert_eq!(cluster.spectral_shifts.get(&3), Some(&7));
        assert_eq!(cluster.spectral_shift_support, 3);
    }
}
