use glam::{Vec2, Vec3};
use tracing::debug;

use super::physics::Simulation;
use crate::config::{InteractionConfig, PhysicsConfig};
use crate::graph::{Graph, NodeId};

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Moved(Vec2),
    Pressed(Vec2),
    Released(Vec2),
    Left,
}

/// A node as the active backend drew it last frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenNode {
    pub center: Vec2,
    pub radius: f32,
    /// Distance from the camera; smaller is nearer. Constant in 2D.
    pub depth: f32,
    pub visible: bool,
}

/// Screen-space snapshot of one frame, indexed like the working graph.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ScreenSpace {
    pub viewport_min: Vec2,
    pub viewport_size: Vec2,
    pub nodes: Vec<ScreenNode>,
}

impl ScreenSpace {
    pub fn min_dimension(&self) -> f32 {
        self.viewport_size.min_element().max(0.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let max = self.viewport_min + self.viewport_size;
        point.cmpge(self.viewport_min).all() && point.cmple(max).all()
    }
}

/// Maps a screen point back into the world. Implemented by each backend.
pub trait Projector {
    /// World point under `screen` at the same depth as `reference`.
    fn unproject(&self, screen: Vec2, reference: Vec3) -> Option<Vec3>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HitTier {
    Exact,
    Proximity,
}

/// Two-tier pick: a pointer inside a drawn disc wins (front-most first);
/// otherwise the nearest centre within `proximity_radius`.
pub fn hit_test(space: &ScreenSpace, pointer: Vec2, proximity_radius: f32) -> Option<(usize, HitTier)> {
    if !pointer.is_finite() {
        return None;
    }

    let visible = || {
        space
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.visible && node.center.is_finite())
    };

    let exact = visible()
        .filter(|(_, node)| node.center.distance(pointer) <= node.radius)
        .min_by(|(_, a), (_, b)| a.depth.total_cmp(&b.depth))
        .map(|(index, _)| (index, HitTier::Exact));
    if exact.is_some() {
        return exact;
    }

    visible()
        .map(|(index, node)| (index, node.center.distance(pointer)))
        .filter(|(_, distance)| *distance <= proximity_radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, _)| (index, HitTier::Proximity))
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InteractionState {
    pub hovered: Option<NodeId>,
    /// Sticky click focus. Unrelated to position pinning.
    pub locked: Option<NodeId>,
    pub dragged: Option<NodeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InteractionMode {
    Idle,
    Hovering(NodeId),
    Dragging(NodeId),
    Locked(NodeId),
}

impl InteractionState {
    pub fn mode(&self) -> InteractionMode {
        if let Some(id) = &self.dragged {
            InteractionMode::Dragging(id.clone())
        } else if let Some(id) = &self.locked {
            InteractionMode::Locked(id.clone())
        } else if let Some(id) = &self.hovered {
            InteractionMode::Hovering(id.clone())
        } else {
            InteractionMode::Idle
        }
    }

    /// Node the highlight is built around; a lock beats a hover.
    pub fn focus(&self) -> Option<&str> {
        self.locked.as_deref().or(self.hovered.as_deref())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Gesture {
    None,
    Node {
        id: NodeId,
        origin: Vec2,
        travel: f32,
        was_pinned: bool,
    },
    Background {
        origin: Vec2,
        last: Vec2,
        travel: f32,
    },
}

/// What the caller should do with the event beyond the engine's own state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerOutcome {
    /// Background drag delta for the camera.
    pub camera_drag: Option<Vec2>,
    pub lock_changed: bool,
}

pub struct InteractionContext<'a> {
    pub graph: &'a Graph,
    pub simulation: &'a mut Simulation,
    pub space: &'a ScreenSpace,
    pub projector: &'a dyn Projector,
    pub config: &'a InteractionConfig,
    pub physics: &'a PhysicsConfig,
}

pub struct InteractionController {
    state: InteractionState,
    gesture: Gesture,
}

impl Default for InteractionController {
    fn default() -> Self {
        Self::new()
    }
}

impl InteractionController {
    pub fn new() -> Self {
        Self {
            state: InteractionState::default(),
            gesture: Gesture::None,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn is_dragging_node(&self) -> bool {
        matches!(self.gesture, Gesture::Node { .. })
    }

    /// Locks `id`, or clears the lock with `None`. Returns whether it changed.
    pub fn set_locked(&mut self, id: Option<NodeId>) -> bool {
        if self.state.locked == id {
            return false;
        }
        self.state.locked = id;
        if self.state.locked.is_some() {
            self.state.hovered = None;
        }
        true
    }

    pub fn toggle_lock(&mut self, id: &str) {
        if self.state.locked.as_deref() == Some(id) {
            self.set_locked(None);
        } else {
            self.set_locked(Some(id.to_owned()));
        }
    }

    /// Forgets ids that are no longer in `graph`.
    pub fn retain(&mut self, graph: &Graph) {
        let keep = |slot: &mut Option<NodeId>| {
            if slot.as_deref().is_some_and(|id| graph.node(id).is_none()) {
                *slot = None;
            }
        };
        keep(&mut self.state.hovered);
        keep(&mut self.state.locked);
        keep(&mut self.state.dragged);
        if self.state.dragged.is_none() && matches!(self.gesture, Gesture::Node { .. }) {
            self.gesture = Gesture::None;
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn handle(&mut self, event: PointerEvent, ctx: InteractionContext<'_>) -> PointerOutcome {
        match event {
            PointerEvent::Moved(pointer) => self.pointer_moved(pointer, ctx),
            PointerEvent::Pressed(pointer) => self.pointer_pressed(pointer, ctx),
            PointerEvent::Released(pointer) => self.pointer_released(pointer, ctx),
            PointerEvent::Left => {
                self.state.hovered = None;
                PointerOutcome::default()
            }
        }
    }

    fn hover_at(&mut self, pointer: Vec2, ctx: &InteractionContext<'_>) {
        let radius = ctx.config.proximity_radius(ctx.space.min_dimension());
        let hit = hit_test(ctx.space, pointer, radius)
            .and_then(|(index, _)| ctx.graph.nodes().get(index))
            .map(|node| node.id.clone());

        self.state.hovered = if self.state.locked.is_some() {
            None
        } else {
            hit
        };
    }

    fn pointer_moved(&mut self, pointer: Vec2, ctx: InteractionContext<'_>) -> PointerOutcome {
        match &mut self.gesture {
            Gesture::None => {
                self.hover_at(pointer, &ctx);
                PointerOutcome::default()
            }
            Gesture::Node { id, origin, travel, .. } => {
                *travel = travel.max(pointer.distance(*origin));
                if *travel >= ctx.config.click_threshold_px
                    && let Some(index) = ctx.graph.index_of(id)
                    && let Some(body) = ctx.simulation.bodies().get(index)
                    && let Some(world) = ctx.projector.unproject(pointer, body.position)
                {
                    ctx.simulation.set_position(index, world);
                }
                PointerOutcome::default()
            }
            Gesture::Background { origin, last, travel } => {
                *travel = travel.max(pointer.distance(*origin));
                let delta = pointer - *last;
                *last = pointer;
                PointerOutcome {
                    camera_drag: (delta != Vec2::ZERO).then_some(delta),
                    lock_changed: false,
                }
            }
        }
    }

    fn pointer_pressed(&mut self, pointer: Vec2, ctx: InteractionContext<'_>) -> PointerOutcome {
        let radius = ctx.config.proximity_radius(ctx.space.min_dimension());
        let hit = hit_test(ctx.space, pointer, radius)
            .and_then(|(index, _)| ctx.graph.nodes().get(index).map(|node| (index, node)));

        self.gesture = match hit {
            Some((index, node)) => {
                let was_pinned = ctx.simulation.is_pinned(index);
                ctx.simulation.set_pinned(index, true);
                ctx.simulation.reheat(ctx.physics);
                self.state.dragged = Some(node.id.clone());
                debug!(node = %node.id, "drag started");
                Gesture::Node {
                    id: node.id.clone(),
                    origin: pointer,
                    travel: 0.0,
                    was_pinned,
                }
            }
            None => Gesture::Background {
                origin: pointer,
                last: pointer,
                travel: 0.0,
            },
        };
        PointerOutcome::default()
    }

    fn pointer_released(&mut self, pointer: Vec2, ctx: InteractionContext<'_>) -> PointerOutcome {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::None);
        let threshold = ctx.config.click_threshold_px;
        let mut outcome = PointerOutcome::default();

        match gesture {
            Gesture::None => {}
            Gesture::Node {
                id,
                origin,
                travel,
                was_pinned,
            } => {
                if let Some(index) = ctx.graph.index_of(&id) {
                    ctx.simulation.set_pinned(index, was_pinned);
                }
                self.state.dragged = None;

                if travel.max(pointer.distance(origin)) < threshold {
                    self.toggle_lock(&id);
                    outcome.lock_changed = true;
                    debug!(node = %id, locked = self.state.locked.is_some(), "node clicked");
                }
            }
            Gesture::Background { origin, travel, .. } => {
                if travel.max(pointer.distance(origin)) < threshold && self.state.locked.is_some()
                {
                    self.set_locked(None);
                    outcome.lock_changed = true;
                }
            }
        }

        self.hover_at(pointer, &ctx);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::physics::Dimension;
    use crate::graph::{RawGraph, RawLink, RawNode, sanitize};

    /// Screen and world share the xy plane.
    struct FlatProjector;

    impl Projector for FlatProjector {
        fn unproject(&self, screen: Vec2, reference: Vec3) -> Option<Vec3> {
            Some(screen.extend(reference.z))
        }
    }

    struct Fixture {
        graph: Graph,
        simulation: Simulation,
        space: ScreenSpace,
        config: InteractionConfig,
        physics: PhysicsConfig,
        controller: InteractionController,
    }

    impl Fixture {
        fn new() -> Self {
            let graph = sanitize(&RawGraph {
                nodes: ["a", "b", "c"].iter().map(|id| RawNode::new(id)).collect(),
                links: vec![RawLink::new("a", "b")],
            });
            let positions = [
                Vec3::new(100.0, 100.0, 0.0),
                Vec3::new(300.0, 100.0, 0.0),
                Vec3::new(500.0, 400.0, 0.0),
            ];
            let simulation = Simulation::new(
                &graph,
                &[10.0; 3],
                &positions,
                Dimension::Two,
                &PhysicsConfig::default(),
            );
            let space = ScreenSpace {
                viewport_min: Vec2::ZERO,
                viewport_size: Vec2::new(800.0, 600.0),
                nodes: positions
                    .iter()
                    .map(|position| ScreenNode {
                        center: position.truncate(),
                        radius: 10.0,
                        depth: 0.0,
                        visible: true,
                    })
                    .collect(),
            };
            Self {
                graph,
                simulation,
                space,
                config: InteractionConfig::default(),
                physics: PhysicsConfig::default(),
                controller: InteractionController::new(),
            }
        }

        fn send(&mut self, event: PointerEvent) -> PointerOutcome {
            self.controller.handle(
                event,
                InteractionContext {
                    graph: &self.graph,
                    simulation: &mut self.simulation,
                    space: &self.space,
                    projector: &FlatProjector,
                    config: &self.config,
                    physics: &self.physics,
                },
            )
        }

        fn click(&mut self, at: Vec2) -> PointerOutcome {
            self.send(PointerEvent::Pressed(at));
            self.send(PointerEvent::Released(at))
        }

        fn locked(&self) -> Option<&str> {
            self.controller.state().locked.as_deref()
        }
    }

    const A: Vec2 = Vec2::new(100.0, 100.0);
    const B: Vec2 = Vec2::new(300.0, 100.0);
    const EMPTY: Vec2 = Vec2::new(700.0, 50.0);

    #[test]
    fn exact_hit_prefers_the_front_most_node() {
        let mut space = ScreenSpace {
            viewport_min: Vec2::ZERO,
            viewport_size: Vec2::splat(200.0),
            nodes: vec![
                ScreenNode {
                    center: Vec2::new(50.0, 50.0),
                    radius: 20.0,
                    depth: 9.0,
                    visible: true,
                },
                ScreenNode {
                    center: Vec2::new(55.0, 50.0),
                    radius: 20.0,
                    depth: 3.0,
                    visible: true,
                },
            ],
        };
        assert_eq!(
            hit_test(&space, Vec2::new(52.0, 50.0), 30.0),
            Some((1, HitTier::Exact))
        );

        space.nodes[1].visible = false;
        assert_eq!(
            hit_test(&space, Vec2::new(52.0, 50.0), 30.0),
            Some((0, HitTier::Exact))
        );
    }

    #[test]
    fn proximity_tier_catches_near_misses_only() {
        let space = ScreenSpace {
            viewport_min: Vec2::ZERO,
            viewport_size: Vec2::splat(400.0),
            nodes: vec![ScreenNode {
                center: Vec2::new(100.0, 100.0),
                radius: 4.0,
                depth: 0.0,
                visible: true,
            }],
        };
        assert_eq!(
            hit_test(&space, Vec2::new(130.0, 100.0), 40.0),
            Some((0, HitTier::Proximity))
        );
        assert_eq!(hit_test(&space, Vec2::new(180.0, 100.0), 40.0), None);
        assert_eq!(hit_test(&space, Vec2::new(f32::NAN, 0.0), 40.0), None);
    }

    #[test]
    fn clicking_toggles_and_moves_the_lock() {
        let mut fixture = Fixture::new();

        assert!(fixture.click(A).lock_changed);
        assert_eq!(fixture.locked(), Some("a"));
        assert_eq!(
            fixture.controller.state().mode(),
            InteractionMode::Locked("a".to_owned())
        );

        fixture.click(A);
        assert_eq!(fixture.locked(), None);
        // Still under the pointer, so it falls back to a hover.
        assert_eq!(
            fixture.controller.state().mode(),
            InteractionMode::Hovering("a".to_owned())
        );

        fixture.click(A);
        fixture.click(B);
        assert_eq!(fixture.locked(), Some("b"));
    }

    #[test]
    fn background_click_clears_the_lock() {
        let mut fixture = Fixture::new();
        fixture.click(A);
        assert!(fixture.click(EMPTY).lock_changed);
        assert_eq!(fixture.locked(), None);
    }

    #[test]
    fn hover_is_suppressed_while_locked() {
        let mut fixture = Fixture::new();
        fixture.send(PointerEvent::Moved(B));
        assert_eq!(fixture.controller.state().hovered.as_deref(), Some("b"));
        assert_eq!(fixture.controller.state().focus(), Some("b"));

        fixture.click(A);
        fixture.send(PointerEvent::Moved(B));
        assert_eq!(fixture.controller.state().hovered, None);
        assert_eq!(fixture.controller.state().focus(), Some("a"));

        fixture.send(PointerEvent::Left);
        assert_eq!(fixture.controller.state().hovered, None);
    }

    #[test]
    fn dragging_moves_the_node_and_restores_its_pin() {
        let mut fixture = Fixture::new();
        fixture.send(PointerEvent::Pressed(A));
        assert!(fixture.simulation.is_pinned(0));
        assert_eq!(
            fixture.controller.state().mode(),
            InteractionMode::Dragging("a".to_owned())
        );

        let target = Vec2::new(160.0, 220.0);
        fixture.send(PointerEvent::Moved(target));
        assert_eq!(fixture.simulation.bodies()[0].position, target.extend(0.0));

        let outcome = fixture.send(PointerEvent::Released(target));
        assert!(!outcome.lock_changed);
        assert_eq!(fixture.locked(), None);
        assert!(!fixture.simulation.is_pinned(0));
        assert_eq!(fixture.controller.state().dragged, None);
    }

    #[test]
    fn drag_keeps_explicitly_fixed_nodes_fixed() {
        let mut fixture = Fixture::new();
        fixture.simulation.set_pinned(1, true);
        fixture.send(PointerEvent::Pressed(B));
        fixture.send(PointerEvent::Moved(B + Vec2::new(40.0, 0.0)));
        fixture.send(PointerEvent::Released(B + Vec2::new(40.0, 0.0)));
        assert!(fixture.simulation.is_pinned(1));
    }

    #[test]
    fn jitter_below_threshold_is_still_a_click() {
        let mut fixture = Fixture::new();
        let before = fixture.simulation.bodies()[0].position;
        fixture.send(PointerEvent::Pressed(A));
        fixture.send(PointerEvent::Moved(A + Vec2::new(1.5, 1.0)));
        fixture.send(PointerEvent::Released(A + Vec2::new(1.5, 1.0)));
        assert_eq!(fixture.locked(), Some("a"));
        assert_eq!(fixture.simulation.bodies()[0].position, before);
    }

    #[test]
    fn background_drag_reports_camera_deltas() {
        let mut fixture = Fixture::new();
        fixture.send(PointerEvent::Pressed(EMPTY));
        let outcome = fixture.send(PointerEvent::Moved(EMPTY + Vec2::new(12.0, -5.0)));
        assert_eq!(outcome.camera_drag, Some(Vec2::new(12.0, -5.0)));
        fixture.send(PointerEvent::Released(EMPTY + Vec2::new(12.0, -5.0)));
        assert_eq!(fixture.locked(), None);
    }

    #[test]
    fn retain_drops_ids_missing_from_the_new_graph() {
        let mut fixture = Fixture::new();
        fixture.click(A);
        fixture.controller.retain(&Graph::empty());
        assert_eq!(fixture.controller.state(), &InteractionState::default());
    }
}
