use std::f32::consts::TAU;

use glam::{Vec2, Vec3, vec2};

use super::quadtree::QuadNode;

const MIN_DISTANCE: f32 = 0.0001;

#[derive(Clone, Copy, Debug)]
pub(super) struct PairParams {
    pub(super) repulsion_strength: f32,
    pub(super) softening: f32,
    pub(super) collision_strength: f32,
    pub(super) collision_padding: f32,
}

#[derive(Clone, Copy)]
pub(super) struct CollisionParams {
    pub(super) collision_strength: f32,
    pub(super) collision_padding: f32,
    pub(super) max_collision_distance_sq: f32,
}

/// Direction used when two bodies sit on the same spot. Derived from the pair
/// of indices so it is stable across frames and never NaN.
pub(super) fn fallback_direction(from: usize, to: usize, three_d: bool) -> Vec3 {
    let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * TAU;
    if !three_d {
        return Vec3::new(angle.cos(), angle.sin(), 0.0);
    }

    let tilt = ((from as f32) * 0.324_718 + (to as f32) * 0.569_840).fract() * 2.0 - 1.0;
    let ring = (1.0 - tilt * tilt).max(0.0).sqrt();
    Vec3::new(angle.cos() * ring, angle.sin() * ring, tilt)
}

fn fallback_direction_2d(from: usize, to: usize) -> Vec2 {
    fallback_direction(from, to, false).truncate()
}

fn repulsion_between(point_a: Vec2, point_b: Vec2, repulsion_strength: f32, softening: f32) -> Vec2 {
    let delta = point_a - point_b;
    let distance_sq = delta.length_squared();
    let distance = distance_sq.sqrt();
    let direction = if distance > MIN_DISTANCE {
        delta / distance
    } else {
        vec2(1.0, 0.0)
    };
    direction * (repulsion_strength / (distance_sq + softening))
}

/// Barnes-Hut repulsion on body `index` from the whole tree.
pub(super) fn accumulate_repulsion_for_node(
    node: &QuadNode,
    index: usize,
    positions: &[Vec2],
    params: PairParams,
    theta: f32,
    force: &mut Vec2,
) {
    if node.mass <= 0.0 {
        return;
    }

    let point = positions[index];

    if node.is_leaf() {
        for &other_index in &node.indices {
            if other_index == index {
                continue;
            }
            let mut push = repulsion_between(
                point,
                positions[other_index],
                params.repulsion_strength,
                params.softening,
            );
            if (point - positions[other_index]).length_squared() <= MIN_DISTANCE * MIN_DISTANCE {
                push = fallback_direction_2d(index.min(other_index), index.max(other_index))
                    * push.length();
                if index > other_index {
                    push = -push;
                }
            }
            *force += push;
        }
        return;
    }

    let delta = point - node.center_of_mass;
    let distance_sq = delta.length_squared().max(MIN_DISTANCE);
    let distance = distance_sq.sqrt();
    let can_approximate = !node.bounds.contains(point)
        && ((node.bounds.side_length() / distance) < theta)
        && node.mass > 1.0;

    if can_approximate {
        let direction = delta / distance;
        let scaled = (params.repulsion_strength * node.mass) / (distance_sq + params.softening);
        *force += direction * scaled;
        return;
    }

    for child in node.children.iter().flatten() {
        accumulate_repulsion_for_node(child, index, positions, params, theta, force);
    }
}

fn collide_pair(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    forces: &mut [Vec2],
) {
    let delta = positions[from] - positions[to];
    let distance = delta.length();
    let direction = if distance > MIN_DISTANCE {
        delta / distance
    } else {
        fallback_direction_2d(from, to)
    };

    let min_distance = (radii[from] + radii[to]) * params.collision_padding;
    if distance < min_distance {
        let overlap_push = (min_distance - distance) * params.collision_strength;
        forces[from] += direction * overlap_push;
        forces[to] -= direction * overlap_push;
    }
}

/// Dual-tree walk that only visits leaf pairs close enough to overlap.
pub(super) fn accumulate_collision_pairs(
    node_a: &QuadNode,
    node_b: &QuadNode,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollisionParams,
    forces: &mut [Vec2],
) {
    if node_a.bounds.distance_sq_to(node_b.bounds) > params.max_collision_distance_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for (offset, &from) in node_a.indices.iter().enumerate() {
                for &to in &node_a.indices[offset + 1..] {
                    collide_pair(from, to, positions, radii, params, forces);
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    collide_pair(from, to, positions, radii, params, forces);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_collision_pairs(child_a, child_a, true, positions, radii, params, forces);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_collision_pairs(
                    child_a, child_b, false, positions, radii, params, forces,
                );
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_collision_pairs(child, node_b, false, positions, radii, params, forces);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_collision_pairs(node_a, child, false, positions, radii, params, forces);
        }
    }
}

/// Exact O(n²) repulsion and collision. Used for small graphs and in 3D.
pub(super) fn accumulate_pairwise(
    positions: &[Vec3],
    radii: &[f32],
    params: PairParams,
    three_d: bool,
    forces: &mut [Vec3],
) {
    let count = positions.len();
    for from in 0..count {
        for to in (from + 1)..count {
            let delta = positions[from] - positions[to];
            let distance_sq = delta.length_squared();
            let distance = distance_sq.sqrt();
            let direction = if distance > MIN_DISTANCE {
                delta / distance
            } else {
                fallback_direction(from, to, three_d)
            };

            let mut push = params.repulsion_strength / (distance_sq + params.softening);

            let min_distance = (radii[from] + radii[to]) * params.collision_padding;
            if distance < min_distance {
                push += (min_distance - distance) * params.collision_strength;
            }

            forces[from] += direction * push;
            forces[to] -= direction * push;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: PairParams = PairParams {
        repulsion_strength: 1000.0,
        softening: 10.0,
        collision_strength: 2.0,
        collision_padding: 1.5,
    };

    #[test]
    fn fallback_direction_is_unit_length() {
        for (from, to) in [(0, 1), (3, 17), (120, 121)] {
            for three_d in [false, true] {
                let direction = fallback_direction(from, to, three_d);
                assert!((direction.length() - 1.0).abs() < 1e-4);
                if !three_d {
                    assert_eq!(direction.z, 0.0);
                }
            }
        }
    }

    #[test]
    fn pairwise_forces_push_apart_and_balance() {
        let positions = [Vec3::ZERO, Vec3::new(5.0, 0.0, 0.0)];
        let mut forces = [Vec3::ZERO; 2];
        accumulate_pairwise(&positions, &[4.0, 4.0], PARAMS, true, &mut forces);

        assert!(forces[0].x < 0.0);
        assert!(forces[1].x > 0.0);
        assert!((forces[0] + forces[1]).length() < 1e-4);
    }

    #[test]
    fn coincident_bodies_get_finite_separating_forces() {
        let positions = [Vec3::ONE; 3];
        let mut forces = [Vec3::ZERO; 3];
        accumulate_pairwise(&positions, &[2.0; 3], PARAMS, false, &mut forces);

        for force in forces {
            assert!(force.is_finite());
            assert!(force.length() > 0.0);
        }
    }

    #[test]
    fn tree_repulsion_matches_direction_of_exact_sum() {
        let positions = (0..40)
            .map(|index| vec2((index % 8) as f32 * 30.0, (index / 8) as f32 * 30.0))
            .collect::<Vec<_>>();
        let tree = QuadNode::build(&positions).unwrap();

        let mut approx = Vec2::ZERO;
        accumulate_repulsion_for_node(&tree, 0, &positions, PARAMS, 0.72, &mut approx);

        let exact = positions[1..]
            .iter()
            .map(|other| repulsion_between(positions[0], *other, 1000.0, 10.0))
            .fold(Vec2::ZERO, |sum, push| sum + push);

        assert!(approx.normalize().dot(exact.normalize()) > 0.95);
    }
}
