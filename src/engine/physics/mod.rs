//! Continuous force simulation over the working graph.
//!
//! Bodies repel (Barnes-Hut in 2D above a size threshold, exact otherwise),
//! collide by radius, and are held together by springs whose rest length
//! depends on the relationship kind. A slowly orbiting centre and a small
//! per-node drift keep a settled layout from looking frozen. An `alpha`
//! factor decays every tick; below `alpha_min` the simulation settles and
//! the forces stop acting until something reheats it. The orbit and drift
//! are also applied directly to positions without the alpha factor, so a
//! settled layout keeps a small bounded wander.

mod forces;
mod prelayout;
mod quadtree;

use std::f32::consts::TAU;

use glam::{Vec2, Vec3};
use tracing::trace;

use crate::config::PhysicsConfig;
use crate::graph::Graph;
use crate::util::stable_phase;
use forces::{
    CollisionParams, PairParams, accumulate_collision_pairs, accumulate_pairwise,
    accumulate_repulsion_for_node,
};
pub use prelayout::{prelayout, seed_position};
use quadtree::QuadNode;

const SOFTENING: f32 = 620.0;
const REPULSION_BASE: f32 = 52_000.0;
const SPRING_BASE: f32 = 0.02;
const SPRING_DAMPING: f32 = 0.22;
const COLLISION_BASE: f32 = 1.9;
/// Share of the breathing orbit applied directly to positions.
const AMBIENT_ORBIT_SHARE: f32 = 0.25;
/// Drift amplitude in world units per unit of `jitter`.
const AMBIENT_DRIFT_PX: f32 = 6.0;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Dimension {
    #[default]
    Two,
    Three,
}

impl Dimension {
    pub fn is_three(self) -> bool {
        self == Self::Three
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SimulationMode {
    Running,
    Settled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Body {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub pinned: bool,
    phase: f32,
}

impl Body {
    /// A free body at rest.
    pub fn at(position: Vec3, radius: f32) -> Self {
        Self {
            position,
            velocity: Vec3::ZERO,
            radius,
            pinned: false,
            phase: 0.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Spring {
    from: usize,
    to: usize,
    rest_length: f32,
    weight: f32,
}

#[derive(Default)]
struct PhysicsScratch {
    forces: Vec<Vec3>,
    positions: Vec<Vec3>,
    flat_forces: Vec<Vec2>,
    flat_positions: Vec<Vec2>,
    radii: Vec<f32>,
}

pub struct Simulation {
    bodies: Vec<Body>,
    springs: Vec<Spring>,
    dimension: Dimension,
    alpha: f32,
    elapsed: f32,
    ticks: u64,
    scratch: PhysicsScratch,
}

impl Simulation {
    /// Builds bodies for every node of `graph`. `positions` may come from a
    /// pre-layout pass or a previous simulation; missing entries are seeded.
    pub fn new(
        graph: &Graph,
        radii: &[f32],
        positions: &[Vec3],
        dimension: Dimension,
        config: &PhysicsConfig,
    ) -> Self {
        let count = graph.node_count();
        let bodies = graph
            .nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| {
                let mut position = positions
                    .get(index)
                    .copied()
                    .filter(|position| position.is_finite())
                    .unwrap_or_else(|| seed_position(&node.id, index, count, dimension));
                if dimension == Dimension::Two {
                    position.z = 0.0;
                }
                Body {
                    position,
                    velocity: Vec3::ZERO,
                    radius: radii.get(index).copied().unwrap_or(6.0),
                    pinned: node.pinned,
                    phase: stable_phase(&node.id),
                }
            })
            .collect();

        let springs = graph
            .links()
            .iter()
            .enumerate()
            .filter_map(|(link_index, link)| {
                let (from, to) = graph.link_endpoints(link_index)?;
                (from != to).then(|| Spring {
                    from,
                    to,
                    rest_length: config.rest_length(&link.kind),
                    weight: link.weight,
                })
            })
            .collect();

        Self {
            bodies,
            springs,
            dimension,
            alpha: config.reheat_alpha,
            elapsed: 0.0,
            ticks: 0,
            scratch: PhysicsScratch::default(),
        }
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// `None` until the first tick has run, or for an unknown index.
    pub fn position(&self, index: usize) -> Option<Vec3> {
        if self.ticks == 0 {
            return None;
        }
        self.bodies.get(index).map(|body| body.position)
    }

    pub fn has_ticked(&self) -> bool {
        self.ticks > 0
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn dimension(&self) -> Dimension {
        self.dimension
    }

    pub fn mode(&self, config: &PhysicsConfig) -> SimulationMode {
        if self.alpha < config.alpha_min {
            SimulationMode::Settled
        } else {
            SimulationMode::Running
        }
    }

    pub fn reheat(&mut self, config: &PhysicsConfig) {
        self.alpha = self.alpha.max(config.reheat_alpha);
    }

    /// Switches between planar and spatial layout, lifting bodies off the
    /// plane (or flattening them) and reheating.
    pub fn set_dimension(&mut self, dimension: Dimension, config: &PhysicsConfig) {
        if self.dimension == dimension {
            return;
        }

        self.dimension = dimension;
        for body in &mut self.bodies {
            match dimension {
                Dimension::Two => {
                    body.position.z = 0.0;
                    body.velocity.z = 0.0;
                }
                Dimension::Three => {
                    let spread = body.position.truncate().length().max(40.0) * 0.35;
                    body.position.z = (body.phase - TAU * 0.5) / TAU * spread;
                }
            }
        }
        self.reheat(config);
    }

    pub fn is_pinned(&self, index: usize) -> bool {
        self.bodies.get(index).is_some_and(|body| body.pinned)
    }

    pub fn set_pinned(&mut self, index: usize, pinned: bool) {
        if let Some(body) = self.bodies.get_mut(index) {
            body.pinned = pinned;
            body.velocity = Vec3::ZERO;
        }
    }

    /// Moves a body directly (used while dragging). Non-finite targets are
    /// ignored.
    pub fn set_position(&mut self, index: usize, position: Vec3) {
        if !position.is_finite() {
            return;
        }
        let flat = self.dimension == Dimension::Two;
        if let Some(body) = self.bodies.get_mut(index) {
            body.position = position;
            if flat {
                body.position.z = 0.0;
            }
            body.velocity = Vec3::ZERO;
        }
    }

    /// Advances by `dt` seconds. Returns whether any body moved.
    ///
    /// The ambient orbit and drift run whether or not the layout has
    /// settled, so a settled layout still moves slightly every tick.
    pub fn tick(&mut self, dt: f32, config: &PhysicsConfig) -> bool {
        let dt = if dt.is_finite() { dt.clamp(0.0, 0.25) } else { 0.0 };
        let previous = self.elapsed;
        self.elapsed += dt;
        self.ticks += 1;

        let mut moved = false;
        if self.mode(config) == SimulationMode::Running {
            moved = self.step(dt, config);
            self.alpha += (config.alpha_target - self.alpha) * config.alpha_decay;
            if self.mode(config) == SimulationMode::Settled {
                trace!(ticks = self.ticks, "simulation settled");
            }
        }

        self.apply_ambient(previous, config) || moved
    }

    /// Moves every free body by the change in its periodic ambient offset
    /// between `previous` and now. The offsets are bounded, so bodies wander
    /// around their rest positions instead of creeping away.
    fn apply_ambient(&mut self, previous: f32, config: &PhysicsConfig) -> bool {
        if self.elapsed <= previous {
            return false;
        }

        let three_d = self.dimension.is_three();
        let orbit = (self.breathing_center_at(self.elapsed, config)
            - self.breathing_center_at(previous, config))
            * AMBIENT_ORBIT_SHARE;
        let drift_scale = config.jitter * AMBIENT_DRIFT_PX;
        let elapsed = self.elapsed;

        let mut any_motion = false;
        for body in &mut self.bodies {
            if body.pinned {
                continue;
            }
            let mut delta = orbit
                + (drift(elapsed, body.phase, three_d) - drift(previous, body.phase, three_d))
                    * drift_scale;
            if !three_d {
                delta.z = 0.0;
            }
            let position = body.position + delta;
            if !position.is_finite() {
                continue;
            }
            if delta.length_squared() > 0.000_001 {
                any_motion = true;
            }
            body.position = position;
        }
        any_motion
    }

    fn breathing_center(&self, config: &PhysicsConfig) -> Vec3 {
        self.breathing_center_at(self.elapsed, config)
    }

    fn breathing_center_at(&self, elapsed: f32, config: &PhysicsConfig) -> Vec3 {
        let angle = elapsed / config.breathing_period_secs * TAU;
        let radius = config.breathing_radius;
        let z = match self.dimension {
            Dimension::Two => 0.0,
            Dimension::Three => (angle * 0.5).sin() * radius * 0.5,
        };
        Vec3::new(angle.cos() * radius, angle.sin() * radius, z)
    }

    fn step(&mut self, dt: f32, config: &PhysicsConfig) -> bool {
        let node_count = self.bodies.len();
        if node_count == 0 {
            return false;
        }

        let three_d = self.dimension.is_three();
        let center = self.breathing_center(config);
        let elapsed = self.elapsed;
        let scratch = &mut self.scratch;
        scratch.forces.clear();
        scratch.forces.resize(node_count, Vec3::ZERO);
        scratch.positions.clear();
        scratch.radii.clear();
        let mut max_radius = 0.0_f32;
        for body in &self.bodies {
            scratch.positions.push(body.position);
            scratch.radii.push(body.radius);
            max_radius = max_radius.max(body.radius);
        }

        let intensity = config.intensity;
        let params = PairParams {
            repulsion_strength: REPULSION_BASE * intensity * config.repulsion_scale,
            softening: SOFTENING,
            collision_strength: COLLISION_BASE * intensity * config.collision_scale,
            collision_padding: config.collision_padding,
        };
        let spring_strength = SPRING_BASE * intensity * config.spring_scale;
        let center_pull = config.center_pull * intensity;
        let damping = (config.velocity_damping - (intensity * 0.015)).clamp(0.5, 0.97);
        let time_step_scale = (dt * 60.0).clamp(0.25, 3.0);
        let damping_factor = damping.powf(time_step_scale);

        let use_tree = !three_d && node_count > config.barnes_hut_threshold;
        if use_tree {
            scratch.flat_positions.clear();
            scratch
                .flat_positions
                .extend(scratch.positions.iter().map(|position| position.truncate()));
            scratch.flat_forces.clear();
            scratch.flat_forces.resize(node_count, Vec2::ZERO);

            if let Some(quadtree) = QuadNode::build(&scratch.flat_positions) {
                for (index, force) in scratch.flat_forces.iter_mut().enumerate() {
                    accumulate_repulsion_for_node(
                        &quadtree,
                        index,
                        &scratch.flat_positions,
                        params,
                        config.barnes_hut_theta,
                        force,
                    );
                }

                let max_collision_distance = max_radius * 2.0 * config.collision_padding;
                if max_collision_distance > 0.0 {
                    accumulate_collision_pairs(
                        &quadtree,
                        &quadtree,
                        true,
                        &scratch.flat_positions,
                        &scratch.radii,
                        CollisionParams {
                            collision_strength: params.collision_strength,
                            collision_padding: params.collision_padding,
                            max_collision_distance_sq: max_collision_distance
                                * max_collision_distance,
                        },
                        &mut scratch.flat_forces,
                    );
                }
            }

            for (force, flat) in scratch.forces.iter_mut().zip(&scratch.flat_forces) {
                *force += flat.extend(0.0);
            }
        } else {
            accumulate_pairwise(
                &scratch.positions,
                &scratch.radii,
                params,
                three_d,
                &mut scratch.forces,
            );
        }

        let forces = &mut scratch.forces;
        for spring in &self.springs {
            let from = &self.bodies[spring.from];
            let to = &self.bodies[spring.to];
            let delta = from.position - to.position;
            let distance_sq = delta.length_squared();
            if distance_sq <= 0.0001 * 0.0001 {
                continue;
            }
            let distance = distance_sq.sqrt();
            let direction = delta / distance;

            let preferred = spring.rest_length + from.radius + to.radius;
            let stretch = (distance - preferred) * spring_strength * spring.weight;
            let damping_force = (from.velocity - to.velocity).dot(direction) * SPRING_DAMPING;
            let correction = direction * (stretch + damping_force);

            forces[spring.from] -= correction;
            forces[spring.to] += correction;
        }

        for (body, force) in self.bodies.iter().zip(forces.iter_mut()) {
            *force -= (body.position - center) * center_pull;
            *force += drift(elapsed, body.phase, three_d) * config.jitter;
        }

        let max_force = 165.0 + (intensity * 90.0);
        let max_speed = 11.0 + (intensity * 15.0);
        let alpha = self.alpha;
        let mut any_motion = false;
        for (body, force) in self.bodies.iter_mut().zip(forces.iter()) {
            if body.pinned {
                body.velocity = Vec3::ZERO;
                continue;
            }

            let force = force.clamp_length_max(max_force);
            let velocity = ((body.velocity + force * (0.055 * time_step_scale * alpha))
                * damping_factor)
                .clamp_length_max(max_speed);
            let mut position = body.position + velocity * time_step_scale;
            if !three_d {
                position.z = 0.0;
            }

            if !velocity.is_finite() || !position.is_finite() {
                body.velocity = Vec3::ZERO;
                continue;
            }

            if velocity.length_squared() > 0.000_001 {
                any_motion = true;
            }
            body.velocity = velocity;
            body.position = position;
        }

        any_motion
    }
}

/// Small per-body wander so a settled-looking layout keeps breathing.
fn drift(elapsed: f32, phase: f32, three_d: bool) -> Vec3 {
    let z = if three_d {
        (elapsed * 0.9 + phase * 2.3).sin()
    } else {
        0.0
    };
    Vec3::new(
        (elapsed * 1.3 + phase).sin(),
        (elapsed * 1.1 + phase * 1.7).cos(),
        z,
    )
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::graph::{RawGraph, RawLink, RawNode, sanitize, synthetic};

    fn chain(count: usize) -> Graph {
        let ids = (0..count).map(|index| format!("n{index}")).collect::<Vec<_>>();
        sanitize(&RawGraph {
            nodes: ids.iter().map(|id| RawNode::new(id)).collect(),
            links: ids
                .windows(2)
                .map(|pair| RawLink::new(&pair[0], &pair[1]))
                .collect(),
        })
    }

    fn simulation(graph: &Graph, positions: &[Vec3], dimension: Dimension) -> Simulation {
        let radii = vec![8.0; graph.node_count()];
        Simulation::new(graph, &radii, positions, dimension, &PhysicsConfig::default())
    }

    #[test]
    fn position_is_undefined_before_first_tick() {
        let graph = chain(3);
        let config = PhysicsConfig::default();
        let mut sim = simulation(&graph, &[], Dimension::Two);
        assert_eq!(sim.position(0), None);
        sim.tick(1.0 / 60.0, &config);
        assert!(sim.position(0).is_some());
        assert_eq!(sim.position(99), None);
    }

    #[test]
    fn coincident_bodies_stay_finite_for_a_thousand_ticks() {
        let config = PhysicsConfig::default();
        for dimension in [Dimension::Two, Dimension::Three] {
            let graph = chain(12);
            let mut sim = simulation(&graph, &vec![Vec3::ZERO; 12], dimension);
            for _ in 0..1000 {
                sim.tick(1.0 / 60.0, &config);
            }
            for body in sim.bodies() {
                assert!(body.position.is_finite());
                assert!(body.velocity.is_finite());
            }
            // The bodies separated.
            let spread = sim.bodies()[0].position.distance(sim.bodies()[11].position);
            assert!(spread > 1.0, "{dimension:?} bodies stayed stacked");
        }
    }

    #[test]
    fn coincident_bodies_stay_finite_on_the_barnes_hut_path() {
        let config = PhysicsConfig::default();
        let count = config.barnes_hut_threshold + 80;
        let graph = chain(count);
        let mut sim = simulation(&graph, &vec![Vec3::ZERO; count], Dimension::Two);
        for _ in 0..1000 {
            sim.tick(1.0 / 60.0, &config);
        }
        assert!(sim.bodies().iter().all(|body| body.position.is_finite()
            && body.velocity.is_finite()
            && body.position.z == 0.0));

        let first = sim.bodies()[0].position;
        let spread = sim
            .bodies()
            .iter()
            .map(|body| body.position.distance(first))
            .fold(0.0_f32, f32::max);
        assert!(spread > 10.0, "bodies stayed stacked");
    }

    #[test]
    fn settled_layout_keeps_a_small_bounded_wander() {
        let config = PhysicsConfig::default();
        let graph = synthetic::generate(3, 40);
        let mut sim = simulation(&graph, &[], Dimension::Two);
        let mut ticks = 0;
        while sim.mode(&config) == SimulationMode::Running {
            sim.tick(1.0 / 60.0, &config);
            ticks += 1;
            assert!(ticks < 10_000, "never settled");
        }

        let rest = sim.bodies().to_vec();
        let mut largest = 0.0_f32;
        for _ in 0..600 {
            assert!(sim.tick(1.0 / 60.0, &config));
            assert_eq!(sim.mode(&config), SimulationMode::Settled);
            for (body, start) in sim.bodies().iter().zip(&rest) {
                largest = largest.max(body.position.distance(start.position));
            }
        }

        let bound = 2.0 * config.breathing_radius * AMBIENT_ORBIT_SHARE
            + 2.0 * config.jitter * AMBIENT_DRIFT_PX * 2.0_f32.sqrt()
            + 0.01;
        assert!(largest > 0.1, "settled layout froze");
        assert!(largest <= bound, "wandered {largest} past {bound}");
    }

    #[test]
    fn ambient_wander_skips_pinned_bodies() {
        let config = PhysicsConfig {
            alpha_min: 2.0,
            ..PhysicsConfig::default()
        };
        let graph = chain(4);
        let mut sim = simulation(&graph, &[], Dimension::Three);
        assert_eq!(sim.mode(&config), SimulationMode::Settled);
        sim.set_pinned(1, true);
        let pinned = sim.bodies()[1].position;
        let free = sim.bodies()[0].position;
        for _ in 0..120 {
            sim.tick(1.0 / 60.0, &config);
        }
        assert_eq!(sim.bodies()[1].position, pinned);
        assert_ne!(sim.bodies()[0].position, free);
    }

    #[test]
    fn two_d_keeps_every_body_on_the_plane() {
        let config = PhysicsConfig::default();
        let graph = synthetic::generate(2, 200);
        let mut sim = simulation(&graph, &[], Dimension::Two);
        for _ in 0..30 {
            sim.tick(1.0 / 60.0, &config);
        }
        assert!(sim.bodies().iter().all(|body| body.position.z == 0.0));
    }

    #[test]
    fn pinned_body_does_not_move() {
        let config = PhysicsConfig::default();
        let graph = chain(6);
        let mut sim = simulation(&graph, &[], Dimension::Three);
        sim.set_pinned(2, true);
        let before = sim.bodies()[2].position;
        for _ in 0..200 {
            sim.tick(1.0 / 60.0, &config);
        }
        assert_eq!(sim.bodies()[2].position, before);
        assert!(sim.is_pinned(2));
    }

    #[test]
    fn running_simulation_settles_and_reheats() {
        let config = PhysicsConfig {
            breathing_radius: 0.0,
            jitter: 0.0,
            ..PhysicsConfig::default()
        };
        let graph = chain(8);
        let mut sim = simulation(&graph, &[], Dimension::Two);
        assert_eq!(sim.mode(&config), SimulationMode::Running);

        let mut ticks = 0;
        while sim.mode(&config) == SimulationMode::Running {
            sim.tick(1.0 / 60.0, &config);
            ticks += 1;
            assert!(ticks < 10_000, "never settled");
        }

        let frozen = sim.bodies().to_vec();
        assert!(!sim.tick(1.0 / 60.0, &config));
        assert_eq!(sim.bodies(), frozen.as_slice());

        sim.reheat(&config);
        assert_eq!(sim.mode(&config), SimulationMode::Running);
        assert!(sim.tick(1.0 / 60.0, &config));
    }

    #[test]
    fn linked_bodies_end_nearer_than_unlinked_ones() {
        let config = PhysicsConfig::default();
        let graph = sanitize(&RawGraph {
            nodes: ["a", "b", "c"].iter().map(|id| RawNode::new(id)).collect(),
            links: vec![RawLink::new("a", "b")],
        });
        let mut sim = simulation(&graph, &[], Dimension::Two);
        for _ in 0..600 {
            sim.tick(1.0 / 60.0, &config);
        }
        let bodies = sim.bodies();
        let linked = bodies[0].position.distance(bodies[1].position);
        let unlinked = bodies[0].position.distance(bodies[2].position);
        assert!(linked < unlinked);
    }

    #[test]
    fn switching_dimension_flattens_and_lifts() {
        let config = PhysicsConfig::default();
        let graph = chain(10);
        let mut sim = simulation(&graph, &[], Dimension::Two);
        sim.set_dimension(Dimension::Three, &config);
        assert!(sim.bodies().iter().any(|body| body.position.z != 0.0));
        sim.set_dimension(Dimension::Two, &config);
        assert!(sim.bodies().iter().all(|body| body.position.z == 0.0));
    }

    #[test]
    fn set_position_ignores_non_finite_targets() {
        let graph = chain(2);
        let mut sim = simulation(&graph, &[], Dimension::Two);
        let before = sim.bodies()[0].position;
        sim.set_position(0, Vec3::new(f32::NAN, 0.0, 0.0));
        assert_eq!(sim.bodies()[0].position, before);
        sim.set_position(0, Vec3::new(10.0, 20.0, 30.0));
        assert_eq!(sim.bodies()[0].position, Vec3::new(10.0, 20.0, 0.0));
    }

    proptest! {
        #[test]
        fn arbitrary_starts_stay_finite(
            seeds in proptest::collection::vec((-50.0f32..50.0, -50.0f32..50.0, -50.0f32..50.0), 2..24),
            three_d in any::<bool>(),
        ) {
            let config = PhysicsConfig::default();
            let graph = chain(seeds.len());
            let positions = seeds
                .iter()
                .map(|(x, y, z)| Vec3::new(*x, *y, *z))
                .collect::<Vec<_>>();
            let dimension = if three_d { Dimension::Three } else { Dimension::Two };
            let mut sim = simulation(&graph, &positions, dimension);
            for _ in 0..120 {
                sim.tick(1.0 / 30.0, &config);
            }
            prop_assert!(sim.bodies().iter().all(|body| body.position.is_finite()));
        }
    }
}
