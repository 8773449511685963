use std::f32::consts::TAU;

use glam::Vec3;

use super::Dimension;
use crate::graph::Graph;
use crate::util::{stable_pair, stable_triple};

/// Starting position for a body with no history: a ring (or shell in 3D)
/// sized to the graph, nudged by a per-id offset so equal indices in
/// different graphs still differ.
pub fn seed_position(id: &str, index: usize, count: usize, dimension: Dimension) -> Vec3 {
    let count = count.max(1);
    let base_radius = (count as f32).sqrt() * 36.0;

    match dimension {
        Dimension::Two => {
            let angle = (index as f32 / count as f32) * TAU;
            let (jx, jy) = stable_pair(id);
            Vec3::new(
                angle.cos() * base_radius + jx * 24.0,
                angle.sin() * base_radius + jy * 24.0,
                0.0,
            )
        }
        Dimension::Three => {
            let (x, y, z) = stable_triple(id);
            let direction = Vec3::new(x, y, z).try_normalize().unwrap_or_else(|| {
                let angle = (index as f32 / count as f32) * TAU;
                Vec3::new(angle.cos(), angle.sin(), 0.0)
            });
            let shell = 0.6 + 0.4 * (index as f32 / count as f32);
            direction * base_radius * shell
        }
    }
}

/// Fruchterman-Reingold warm-up run before the graph is handed to the live
/// simulation. Pure and thread-safe, so the loader can run it off the frame
/// loop. Returns one position per node of `graph`.
pub fn prelayout(graph: &Graph, radii: &[f32], dimension: Dimension, iterations: usize) -> Vec<Vec3> {
    let n = graph.node_count();
    let mut positions = graph
        .nodes()
        .iter()
        .enumerate()
        .map(|(index, node)| seed_position(&node.id, index, n, dimension))
        .collect::<Vec<_>>();

    if n < 2 {
        return positions;
    }

    let base_radius = (n as f32).sqrt() * 36.0;
    let area = (base_radius * 2.4).powi(2);
    let k = (area / n as f32).sqrt().max(24.0);
    let mut temperature = (k * 2.5).max(60.0);
    let radius_of = |index: usize| radii.get(index).copied().unwrap_or(6.0);

    let mut disp = vec![Vec3::ZERO; n];
    for _ in 0..iterations {
        disp.fill(Vec3::ZERO);

        for i in 0..n {
            for j in (i + 1)..n {
                let delta = positions[i] - positions[j];
                let distance = delta.length().max(0.5);
                let direction = delta / distance;

                let (ri, rj) = (radius_of(i), radius_of(j));
                let min_distance = (ri + rj) * 1.6;

                let mut force = (k * k) / distance;
                if distance < min_distance {
                    force += (min_distance - distance) * 2.4;
                }
                disp[i] += direction * force;
                disp[j] -= direction * force;
            }
        }

        for link_index in 0..graph.link_count() {
            let Some((from, to)) = graph.link_endpoints(link_index) else {
                continue;
            };
            if from == to {
                continue;
            }

            let delta = positions[from] - positions[to];
            let distance = delta.length().max(0.5);
            let direction = delta / distance;
            let ideal_length = k + (radius_of(from) + radius_of(to)) * 2.0;
            let force = (distance - ideal_length) * 0.18;

            disp[from] -= direction * force;
            disp[to] += direction * force;
        }

        for (position, delta) in positions.iter_mut().zip(&mut disp) {
            *delta -= *position * 0.0012;
            let length = delta.length();
            if length > 0.0 && length.is_finite() {
                *position += *delta / length * length.min(temperature) * 0.92;
            }
            if dimension == Dimension::Two {
                position.z = 0.0;
            }
        }

        temperature *= 0.965;
        if temperature < 0.55 {
            break;
        }
    }

    positions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::synthetic;

    #[test]
    fn seeds_are_deterministic_and_flat_in_two_d() {
        let a = seed_position("PN-1", 3, 10, Dimension::Two);
        assert_eq!(a, seed_position("PN-1", 3, 10, Dimension::Two));
        assert_eq!(a.z, 0.0);

        let b = seed_position("PN-1", 3, 10, Dimension::Three);
        assert!(b.is_finite());
        assert!(b.length() > 0.0);
    }

    #[test]
    fn prelayout_is_finite_and_sized() {
        let graph = synthetic::generate(5, 60);
        let radii = vec![8.0; graph.node_count()];
        for dimension in [Dimension::Two, Dimension::Three] {
            let positions = prelayout(&graph, &radii, dimension, 60);
            assert_eq!(positions.len(), graph.node_count());
            assert!(positions.iter().all(|position| position.is_finite()));
            if dimension == Dimension::Two {
                assert!(positions.iter().all(|position| position.z == 0.0));
            }
        }
    }

    #[test]
    fn linked_nodes_end_closer_than_average() {
        let graph = synthetic::generate(9, 40);
        let radii = vec![6.0; graph.node_count()];
        let positions = prelayout(&graph, &radii, Dimension::Two, 120);

        let linked = (0..graph.link_count())
            .filter_map(|index| graph.link_endpoints(index))
            .map(|(from, to)| positions[from].distance(positions[to]))
            .sum::<f32>()
            / graph.link_count() as f32;

        let mut total = 0.0;
        let mut pairs = 0.0;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                total += positions[i].distance(positions[j]);
                pairs += 1.0;
            }
        }

        assert!(linked < total / pairs);
    }
}
