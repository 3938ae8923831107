//! Rule decoding: mapping a cluster's kinematic and spectral signature to
//! a candidate transformation rule.
//!
//! The decision cascade is ordered from the strongest signatures to the
//! weakest; the first match wins. Confidences assigned here are
//! provisional and are overwritten once the oracle replays the rule
//! against the training pairs.

use glam::Vec3;
use num_complex::Complex;
use rustfft::FftPlanner;

use crate::schema::{Grid, RuleKind, SolverConfig, TransformationRule};

use super::cluster::Cluster;
use super::codec::{GRID_SCALE, PatternLayer, color_for};
use super::field::Particle;

/// Minimum activation samples before periodicity analysis is attempted.
const MIN_SPECTRUM_SAMPLES: usize = 16;

/// Minimum members supporting a spectral shift before it becomes a rule.
const MIN_SHIFT_SUPPORT: usize = 5;

/// Largest pattern block the decoder will lift out of a cluster.
const MAX_BLOCK_DIM: i32 = 10;

/// Decodes clusters into candidate transformation rules.
pub struct RuleDecoder {
    config: SolverConfig,
    planner: FftPlanner<f32>,
}

impl RuleDecoder {
    pub fn new(config: &SolverConfig) -> Self {
        Self {
            config: config.clone(),
            planner: FftPlanner::new(),
        }
    }

    /// First-match-wins cascade over the cluster's signature.
    pub fn decode(&mut self, cluster: &Cluster, particles: &[Particle]) -> TransformationRule {
        // 1. Coherent linear motion reads as a translation.
        let planar_speed = cluster.mean_velocity.truncate().length();
        if planar_speed > self.config.translation_speed_threshold
            && cluster.spatial_coherence > 0.8
        {
            let (dx, dy) = velocity_to_cells(cluster.mean_velocity);
            return TransformationRule::new(
                RuleKind::Translation { dx, dy },
                cluster.spatial_coherence,
            );
        }

        // 2. Net spin reads as a rotation.
        if cluster.angular_momentum.abs() > self.config.rotation_threshold {
            let quarter_turns = principal_axis_quarter_turns(cluster, particles);
            let confidence = rotational_coherence(cluster, particles);
            return TransformationRule::new(RuleKind::Rotation { quarter_turns }, confidence);
        }

        // 3. Mirror-symmetric layout reads as a reflection.
        if cluster.symmetry_score > 0.9 {
            if let Some(&axis) = cluster.symmetry_axes.first() {
                return TransformationRule::new(
                    RuleKind::Reflection { axis },
                    cluster.symmetry_score,
                );
            }
        }

        // 4. Consistent spectral drift reads as a color map.
        if !cluster.spectral_shifts.is_empty()
            && cluster.spectral_shift_support >= MIN_SHIFT_SUPPORT
        {
            let confidence =
                cluster.spectral_shift_support as f32 / cluster.spectral_pairs.max(1) as f32;
            return TransformationRule::new(
                RuleKind::ColorMap {
                    map: cluster.spectral_shifts.clone(),
                },
                confidence,
            );
        }

        // 5. A dominant periodic component in the activations reads as a
        // repeating pattern fill.
        if self.has_dominant_oscillation(&cluster.activation_sequence) {
            if let Some(block) = extract_block(cluster, particles) {
                return TransformationRule::new(RuleKind::PatternFill { block }, 0.7);
            }
        }

        // 6. A long bridge edge in the spanning tree reads as connectivity.
        if has_bridge_edge(cluster, particles) {
            let color = modal_color(cluster, particles);
            return TransformationRule::new(RuleKind::Connectivity { color }, 0.75);
        }

        TransformationRule::none()
    }

    /// Forward FFT of the activation sequence; true when the strongest
    /// non-DC component carries more than half the DC magnitude.
    fn has_dominant_oscillation(&mut self, sequence: &[f32]) -> bool {
        if sequence.len() < MIN_SPECTRUM_SAMPLES {
            return false;
        }

        let fft = self.planner.plan_fft_forward(sequence.len());
        let mut buffer: Vec<Complex<f32>> =
            sequence.iter().map(|&a| Complex::new(a, 0.0)).collect();
        fft.process(&mut buffer);

        let dc = buffer[0].norm();
        if dc < 1e-6 {
            return false;
        }

        let peak = buffer[1..sequence.len() / 2]
            .iter()
            .map(|c| c.norm())
            .fold(0.0f32, f32::max);

        peak / dc > 0.5
    }
}

/// Map a simulation-space velocity to whole grid cells, snapping to the
/// dominant axis when rounding would collapse the motion entirely.
fn velocity_to_cells(velocity: Vec3) -> (i32, i32) {
    let cells_x = velocity.x / GRID_SCALE;
    let cells_y = velocity.y / GRID_SCALE;
    let mut dx = cells_x.round() as i32;
    let mut dy = cells_y.round() as i32;

    if dx == 0 && dy == 0 {
        if cells_x.abs() >= cells_y.abs() {
            dx = cells_x.signum() as i32;
        } else {
            dy = cells_y.signum() as i32;
        }
    }

    (dx, dy)
}

/// Rotation angle from the dominant eigenvector of the xy position
/// covariance, quantized to the nearest quarter turn.
fn principal_axis_quarter_turns(cluster: &Cluster, particles: &[Particle]) -> u8 {
    let mut cxx = 0.0f32;
    let mut cyy = 0.0f32;
    let mut cxy = 0.0f32;
    let mut mass = 0.0f32;

    for &i in &cluster.members {
        let p = &particles[i];
        let r = p.position - cluster.centroid;
        cxx += p.luminosity * r.x * r.x;
        cyy += p.luminosity * r.y * r.y;
        cxy += p.luminosity * r.x * r.y;
        mass += p.luminosity;
    }

    if mass > 1e-6 {
        cxx /= mass;
        cyy /= mass;
        cxy /= mass;
    }

    let angle = 0.5 * (2.0 * cxy).atan2(cxx - cyy);
    let quarter = (angle / std::f32::consts::FRAC_PI_2).round() as i32;
    let quarter = quarter.rem_euclid(4) as u8;

    if quarter == 0 {
        // Degenerate alignment: let the spin direction pick the turn.
        if cluster.angular_momentum > 0.0 { 1 } else { 3 }
    } else {
        quarter
    }
}

/// Fraction of cluster motion that is tangential: |L| over the maximum
/// angular momentum the same speeds could produce.
fn rotational_coherence(cluster: &Cluster, particles: &[Particle]) -> f32 {
    let mut lz = 0.0f32;
    let mut bound = 0.0f32;

    for &i in &cluster.members {
        let p = &particles[i];
        let r = p.position - cluster.centroid;
        let v = p.velocity - cluster.mean_velocity;
        lz += p.luminosity * (r.x * v.y - r.y * v.x);
        bound += p.luminosity * r.truncate().length() * v.truncate().length();
    }

    if bound > 1e-6 {
        (lz.abs() / bound).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Lift the output-layer members into a small grid block, anchored at
/// their bounding box and decoded through the codec.
fn extract_block(cluster: &Cluster, particles: &[Particle]) -> Option<Grid> {
    let members: Vec<&Particle> = cluster
        .members
        .iter()
        .map(|&i| &particles[i])
        .filter(|p| p.layer == PatternLayer::Output)
        .collect();

    if members.is_empty() {
        return None;
    }

    let cell = |p: &Particle| {
        (
            (p.position.x / GRID_SCALE).round() as i32,
            (p.position.y / GRID_SCALE).round() as i32,
        )
    };
    let min_x = members.iter().map(|p| cell(p).0).min()?;
    let min_y = members.iter().map(|p| cell(p).1).min()?;
    let max_x = members.iter().map(|p| cell(p).0).max()?;
    let max_y = members.iter().map(|p| cell(p).1).max()?;

    let (w, h) = (max_x - min_x + 1, max_y - min_y + 1);
    if w <= 0 || h <= 0 || w > MAX_BLOCK_DIM || h > MAX_BLOCK_DIM {
        return None;
    }

    let anchor = Vec3::new(min_x as f32, min_y as f32, 0.0) * GRID_SCALE;
    let block = super::codec::decode(
        members
            .iter()
            .map(|p| (p.position - anchor, p.wavelength)),
        w as usize,
        h as usize,
    );
    Some(block)
}

/// Prim minimum spanning tree over member positions; a bridge exists when
/// the longest edge is more than three times the mean edge.
fn has_bridge_edge(cluster: &Cluster, particles: &[Particle]) -> bool {
    let positions: Vec<Vec3> = cluster
        .members
        .iter()
        .map(|&i| particles[i].position)
        .collect();
    let n = positions.len();
    if n < 3 {
        return false;
    }

    let mut in_tree = vec![false; n];
    let mut best = vec![f32::MAX; n];
    in_tree[0] = true;
    for j in 1..n {
        best[j] = positions[0].distance(positions[j]);
    }

    let mut edges = Vec::with_capacity(n - 1);
    for _ in 1..n {
        let mut next = usize::MAX;
        let mut next_dist = f32::MAX;
        for j in 0..n {
            if !in_tree[j] && best[j] < next_dist {
                next = j;
                next_dist = best[j];
            }
        }
        if next == usize::MAX {
            break;
        }
        in_tree[next] = true;
        edges.push(next_dist);
        for j in 0..n {
            if !in_tree[j] {
                best[j] = best[j].min(positions[next].distance(positions[j]));
            }
        }
    }

    if edges.is_empty() {
        return false;
    }
    let mean = edges.iter().sum::<f32>() / edges.len() as f32;
    let max = edges.iter().fold(0.0f32, |a, &b| a.max(b));
    mean > 1e-6 && max > mean * 3.0
}

/// Most common palette color among the cluster members.
fn modal_color(cluster: &Cluster, particles: &[Particle]) -> i32 {
    let mut counts = [0usize; crate::schema::PALETTE_SIZE];
    for &i in &cluster.members {
        let color = color_for(particles[i].wavelength).clamp(0, 9) as usize;
        counts[color] += 1;
    }
    counts
        .iter()
        .enumerate()
        .max_by_key(|&(_, &c)| c)
        .map(|(color, _)| color as i32)
        .unwrap_or(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::cluster::ClusterExtractor;
    use crate::compute::codec::wavelength_for;
    use crate::schema::Axis;

    fn particle(x: f32, y: f32) -> Particle {
        Particle {
            position: Vec3::new(x, y, 0.0),
            velocity: Vec3::ZERO,
            wavelength: wavelength_for(1),
            luminosity: 2.0,
            energy: 1.0,
            activation: 0.0,
            cell_index: 0,
            example: 0,
            layer: PatternLayer::Input,
            age: 1.0,
            active: true,
        }
    }

    fn extract_one(particles: &[Particle]) -> Cluster {
        let extractor = ClusterExtractor::new(&SolverConfig {
            min_cluster_size: 2,
            ..Default::default()
        });
        let mut clusters = extractor.extract(particles);
        assert_eq!(clusters.len(), 1);
        clusters.remove(0)
    }

    #[test]
    fn test_coherent_motion_decodes_to_translation() {
        // Tight cluster drifting one cell per unit time along +x.
        let mut particles = Vec::new();
        for i in 0..4 {
            let mut p = particle(i as f32 * 5.0, 0.0);
            p.velocity = Vec3::new(120.0, 0.0, 0.0);
            particles.push(p);
        }

        let cluster = extract_one(&particles);
        let mut decoder = RuleDecoder::new(&SolverConfig::default());
        let rule = decoder.decode(&cluster, &particles);
        assert_eq!(rule.kind, RuleKind::Translation { dx: 1, dy: 0 });
        assert!(rule.confidence > 0.8);
    }

    #[test]
    fn test_slow_subcell_motion_snaps_to_unit_shift() {
        let mut particles = Vec::new();
        for i in 0..4 {
            let mut p = particle(i as f32 * 5.0, 0.0);
            p.velocity = Vec3::new(0.0, 30.0, 0.0);
            particles.push(p);
        }

        let cluster = extract_one(&particles);
        let mut decoder = RuleDecoder::new(&SolverConfig::default());
        let rule = decoder.decode(&cluster, &particles);
        assert_eq!(rule.kind, RuleKind::Translation { dx: 0, dy: 1 });
    }

    #[test]
    fn test_spinning_cluster_decodes_to_rotation() {
        let mut particles = Vec::new();
        for (x, y, vx, vy) in [
            (100.0f32, 0.0f32, 0.0f32, 5.0f32),
            (-100.0, 0.0, 0.0, -5.0),
            (0.0, 100.0, -5.0, 0.0),
            (0.0, -100.0, 5.0, 0.0),
        ] {
            let mut p = particle(x, y);
            p.velocity = Vec3::new(vx, vy, 0.0);
            particles.push(p);
        }

        let cluster = extract_one(&particles);
        let mut decoder = RuleDecoder::new(&SolverConfig::default());
        let rule = decoder.decode(&cluster, &particles);
        assert!(matches!(rule.kind, RuleKind::Rotation { .. }));
        // Pure tangential motion is fully coherent rotation.
        assert!(rule.confidence > 0.9);
    }

    #[test]
    fn test_symmetric_cluster_decodes_to_reflection() {
        let particles = vec![
            particle(0.0, 60.0),
            particle(0.0, -60.0),
            particle(80.0, 65.0),
            particle(80.0, -65.0),
        ];

        let cluster = extract_one(&particles);
        let mut decoder = RuleDecoder::new(&SolverConfig::default());
        let rule = decoder.decode(&cluster, &particles);
        assert!(matches!(
            rule.kind,
            RuleKind::Reflection {
                axis: Axis::Horizontal
            } | RuleKind::Reflection {
                axis: Axis::Vertical
            }
        ));
    }

    #[test]
    fn test_spectral_shift_decodes_to_color_map() {
        // Zigzag chain, deliberately mirror-asymmetric so the cascade
        // falls through to the spectral branch. Output-layer particles
        // sit on their input partners.
        let mut particles = Vec::new();
        for cell in 0..6 {
            let x = cell as f32 * 130.0;
            let y = if cell % 2 == 0 { 0.0 } else { 120.0 };
            let mut input = particle(x, y);
            input.cell_index = cell;
            input.wavelength = wavelength_for(3);
            let mut output = particle(x, y);
            output.cell_index = cell;
            output.layer = PatternLayer::Output;
            output.wavelength = wavelength_for(7);
            particles.push(input);
            particles.push(output);
        }

        let extractor = ClusterExtractor::new(&SolverConfig {
            min_cluster_size: 2,
            link_radius: 200.0,
            ..Default::default()
        });
        let mut clusters = extractor.extract(&particles);
        assert_eq!(clusters.len(), 1);
        let cluster = clusters.remove(0);
        assert!(cluster.symmetry_score < 0.9);

        let mut decoder = RuleDecoder::new(&SolverConfig::default());
        let rule = decoder.decode(&cluster, &particles);
        match rule.kind {
            RuleKind::ColorMap { map } => {
                assert_eq!(map.get(&3), Some(&7));
            }
            other => panic!("expected color map, got {other:?}"),
        }
        assert_eq!(rule.confidence, 1.0);
    }

    #[test]
    fn test_quiet_cluster_decodes_to_none() {
        // Asymmetric static layout with nothing to read.
        let particles = vec![
            particle(0.0, 0.0),
            particle(120.0, 0.0),
            particle(240.0, 90.0),
        ];
        let cluster = extract_one(&particles);
        let mut decoder = RuleDecoder::new(&SolverConfig::default());
        let rule = decoder.decode(&cluster, &particles);
        assert_eq!(rule.kind, RuleKind::None);
        assert_eq!(rule.confidence, 0.0);
    }

    #[test]
    fn test_bridge_edge_detection() {
        // Two tight pods joined by one long span.
        let mut particles = Vec::new();
        for i in 0..3 {
            particles.push(particle(i as f32 * 10.0, 0.0));
        }
        for i in 0..3 {
            particles.push(particle(140.0 + i as f32 * 10.0, 0.0));
        }
        let cluster = extract_one(&particles);
        assert!(has_bridge_edge(&cluster, &particles));

        let even: Vec<Particle> = (0..6).map(|i| particle(i as f32 * 10.0, 0.0)).collect();
        let cluster = extract_one(&even);
        assert!(!has_bridge_edge(&cluster, &even));
    }
}
