//! Drawing backends. Both share the same frame contract: they project the
//! simulator's bodies into a [`ScreenSpace`], turn screen points back into
//! world points for dragging, and own their camera. Everything else (edges,
//! nodes, labels, tooltip, particles) is drawn here from the screen space, so
//! the two backends only differ in how they project.

mod flat;
mod scene3d;

use std::collections::HashSet;
use std::f32::consts::TAU;

use eframe::egui::{Align2, Color32, FontId, Painter, Pos2, Rect, Stroke, vec2};
use thiserror::Error;

use dmsms_graph::config::{CameraConfig, RenderConfig};
use dmsms_graph::engine::physics::{Body, Dimension};
use dmsms_graph::engine::{Emphasis, Highlight, InteractionState, Projector, ScreenSpace};
use dmsms_graph::graph::Graph;
use dmsms_graph::util::truncate_label;

use super::render_utils::{
    blend_color, dim_color, edge_visible, kind_color, lerp_pos, to_pos2, tooltip_anchor,
    with_alpha,
};
pub(super) use flat::FlatBackend;
pub(super) use scene3d::SceneBackend;

#[derive(Debug, Error, PartialEq)]
pub(super) enum BackendError {
    #[error("field of view {0}° is outside 1°..179°")]
    FieldOfView(f32),
    #[error("clip planes near={near} far={far} are invalid")]
    ClipPlanes { near: f32, far: f32 },
    #[error("camera distance {0} is inside the near plane")]
    CameraDistance(f32),
    #[error("camera matrices are not finite")]
    Degenerate,
}

pub(super) trait RenderBackend: Projector {
    fn kind(&self) -> Dimension;

    fn projector(&self) -> &dyn Projector;

    /// Updates the viewport and camera for this frame.
    fn prepare(&mut self, rect: Rect, dt: f32) -> Result<(), BackendError>;

    fn project(&self, bodies: &[Body]) -> ScreenSpace;

    fn camera_drag(&mut self, delta: glam::Vec2);

    fn zoom(&mut self, pointer: glam::Vec2, scroll: f32);

    /// Frames every body. Only ever called from an explicit user action.
    fn reset_camera(&mut self, bodies: &[Body]);

    fn draw_background(&self, painter: &Painter);

    /// Whether nodes get a fake sphere highlight.
    fn shaded_nodes(&self) -> bool {
        false
    }

    /// Whether the camera moves on its own and needs repaints.
    fn is_animating(&self) -> bool {
        false
    }

    fn draw(&self, painter: &Painter, frame: &DrawFrame<'_>) -> DrawStats {
        self.draw_background(painter);
        draw_frame(painter, frame, self.shaded_nodes())
    }
}

/// Builds the backend for `dimension`. A 3D camera that cannot be built
/// degrades to the flat backend; the error is returned alongside so the
/// caller can tell the user.
pub(super) fn make_backend(
    dimension: Dimension,
    camera: &CameraConfig,
) -> (Box<dyn RenderBackend>, Option<BackendError>) {
    match dimension {
        Dimension::Two => (Box::new(FlatBackend::new()), None),
        Dimension::Three => match SceneBackend::new(camera) {
            Ok(backend) => (Box::new(backend), None),
            Err(error) => (Box::new(FlatBackend::new()), Some(error)),
        },
    }
}

/// Everything one frame draws from. Read-only; the engine is not touched.
pub(super) struct DrawFrame<'a> {
    pub(super) rect: Rect,
    pub(super) graph: &'a Graph,
    pub(super) bodies: &'a [Body],
    pub(super) space: &'a ScreenSpace,
    pub(super) highlight: &'a Highlight,
    pub(super) state: &'a InteractionState,
    pub(super) search_matches: Option<&'a HashSet<usize>>,
    pub(super) render: &'a RenderConfig,
    pub(super) dim_factor: f32,
    pub(super) time: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(super) struct DrawStats {
    pub(super) visible_nodes: usize,
    pub(super) visible_edges: usize,
}

const EDGE_COLOR: Color32 = Color32::from_rgba_premultiplied(88, 102, 120, 190);
const FOCUS_EDGE_COLOR: Color32 = Color32::from_rgb(241, 146, 94);
const SEARCH_COLOR: Color32 = Color32::from_rgb(103, 196, 255);
const LOCK_COLOR: Color32 = Color32::from_rgb(245, 206, 93);

impl DrawFrame<'_> {
    /// Projected size relative to world size, used to scale strokes by depth.
    fn scale_of(&self, index: usize) -> f32 {
        match (self.space.nodes.get(index), self.bodies.get(index)) {
            (Some(screen), Some(body)) if body.radius > 0.0 => {
                (screen.radius / body.radius).clamp(0.15, 4.0)
            }
            _ => 1.0,
        }
    }

    fn center(&self, index: usize) -> Option<Pos2> {
        self.space
            .nodes
            .get(index)
            .filter(|node| node.center.is_finite())
            .map(|node| to_pos2(node.center))
    }

    fn search_active(&self) -> bool {
        self.search_matches.is_some_and(|matches| !matches.is_empty())
    }

    fn is_search_match(&self, index: usize) -> bool {
        self.search_matches
            .is_some_and(|matches| matches.contains(&index))
    }
}

/// Far-to-near so nearer discs overdraw farther ones.
fn draw_order(space: &ScreenSpace) -> Vec<usize> {
    let mut order = (0..space.nodes.len())
        .filter(|&index| space.nodes[index].visible)
        .collect::<Vec<_>>();
    order.sort_by(|a, b| space.nodes[*b].depth.total_cmp(&space.nodes[*a].depth));
    order
}

fn draw_frame(painter: &Painter, frame: &DrawFrame<'_>, shaded: bool) -> DrawStats {
    let mut stats = DrawStats::default();
    stats.visible_edges = draw_edges(painter, frame);
    draw_particles(painter, frame);

    let order = draw_order(frame.space);
    stats.visible_nodes = order.len();
    for &index in &order {
        draw_node(painter, frame, index, shaded);
    }

    draw_pulse(painter, frame);
    draw_tooltip(painter, frame);
    stats
}

fn draw_edges(painter: &Painter, frame: &DrawFrame<'_>) -> usize {
    let mut drawn = 0;
    let highlight_active = frame.highlight.is_active();

    for (link_index, link) in frame.graph.links().iter().enumerate() {
        let Some((from, to)) = frame.graph.link_endpoints(link_index) else {
            continue;
        };
        let (Some(start), Some(end)) = (frame.center(from), frame.center(to)) else {
            continue;
        };
        let either_visible = frame.space.nodes[from].visible || frame.space.nodes[to].visible;
        if !either_visible && !edge_visible(frame.rect, start, end, 2.0) {
            continue;
        }

        let emphasized = frame.highlight.is_edge_emphasized(link_index);
        let depth_scale = (frame.scale_of(from) + frame.scale_of(to)) * 0.5;
        let mut width =
            frame.render.base_edge_width * link.weight.sqrt().clamp(0.5, 2.5) * depth_scale.sqrt();
        let color = if emphasized {
            width *= 1.8;
            FOCUS_EDGE_COLOR
        } else if highlight_active {
            with_alpha(EDGE_COLOR, frame.highlight.edge_alpha(link_index, frame.dim_factor))
        } else {
            EDGE_COLOR
        };

        painter.line_segment([start, end], Stroke::new(width.clamp(0.3, 6.0), color));
        drawn += 1;
    }
    drawn
}

/// Dots flowing from source to target along the focused node's links.
fn draw_particles(painter: &Painter, frame: &DrawFrame<'_>) {
    let per_edge = frame.render.particles_per_edge;
    if per_edge == 0 || !frame.highlight.is_active() {
        return;
    }

    for link_index in frame.highlight.related_edges() {
        let Some((from, to)) = frame.graph.link_endpoints(link_index) else {
            continue;
        };
        let (Some(start), Some(end)) = (frame.center(from), frame.center(to)) else {
            continue;
        };

        let offset = (link_index as f32 * 0.618_034).fract();
        let radius = (1.6 * frame.scale_of(from).max(frame.scale_of(to)).sqrt()).clamp(1.0, 4.0);
        for particle in 0..per_edge {
            let t = (frame.time * frame.render.particle_speed
                + offset
                + particle as f32 / per_edge as f32)
                .fract();
            let fade = (t * TAU * 0.5).sin().clamp(0.2, 1.0);
            painter.circle_filled(
                lerp_pos(start, end, t),
                radius,
                with_alpha(Color32::from_rgb(255, 226, 180), fade),
            );
        }
    }
}

fn draw_node(painter: &Painter, frame: &DrawFrame<'_>, index: usize, shaded: bool) {
    let (Some(node), Some(screen)) = (frame.graph.nodes().get(index), frame.space.nodes.get(index))
    else {
        return;
    };
    let center = to_pos2(screen.center);
    let radius = screen.radius;

    let emphasis = frame.highlight.node_emphasis(index);
    let is_match = frame.is_search_match(index);
    let base = kind_color(&node.kind);
    let color = match emphasis {
        Emphasis::Focus => blend_color(base, Color32::WHITE, 0.25),
        Emphasis::Neighbor => base,
        Emphasis::Dimmed => dim_color(base, frame.dim_factor),
        Emphasis::Normal if is_match => blend_color(base, SEARCH_COLOR, 0.6),
        Emphasis::Normal if frame.search_active() => dim_color(base, frame.dim_factor + 0.15),
        Emphasis::Normal => base,
    };

    if emphasis == Emphasis::Focus {
        painter.circle_filled(center, radius * 1.9, with_alpha(color, 0.18));
    }

    painter.circle_filled(center, radius, color);
    if shaded {
        let glint = center + vec2(-radius * 0.3, -radius * 0.35);
        painter.circle_filled(
            glint,
            radius * 0.45,
            with_alpha(Color32::WHITE, if emphasis == Emphasis::Dimmed { 0.08 } else { 0.22 }),
        );
    }

    let outline = if node.pinned {
        Stroke::new(2.0, Color32::from_gray(235))
    } else if is_match {
        Stroke::new(1.6, SEARCH_COLOR)
    } else {
        Stroke::new(1.0, Color32::from_rgba_unmultiplied(12, 12, 12, 190))
    };
    painter.circle_stroke(center, radius, outline);

    let show_label = matches!(emphasis, Emphasis::Focus | Emphasis::Neighbor)
        || is_match
        || radius >= frame.render.label_radius_px;
    if show_label {
        let alpha = if emphasis == Emphasis::Dimmed { frame.dim_factor } else { 0.92 };
        painter.text(
            center + vec2(radius + 5.0, 0.0),
            Align2::LEFT_CENTER,
            truncate_label(&node.label, frame.render.label_max_chars),
            FontId::proportional(12.0),
            with_alpha(Color32::from_gray(238), alpha),
        );
    }
}

fn draw_pulse(painter: &Painter, frame: &DrawFrame<'_>) {
    let Some(index) = frame
        .state
        .locked
        .as_deref()
        .and_then(|id| frame.graph.index_of(id))
    else {
        return;
    };
    let Some(screen) = frame.space.nodes.get(index).filter(|node| node.visible) else {
        return;
    };

    let phase = (frame.time * 0.8).fract();
    painter.circle_stroke(
        to_pos2(screen.center),
        screen.radius + 4.0 + phase * 14.0,
        Stroke::new(2.0 * (1.0 - phase) + 0.5, with_alpha(LOCK_COLOR, 1.0 - phase)),
    );
}

fn draw_tooltip(painter: &Painter, frame: &DrawFrame<'_>) {
    let Some(index) = frame.highlight.focus() else {
        return;
    };
    let (Some(node), Some(screen)) = (frame.graph.nodes().get(index), frame.space.nodes.get(index))
    else {
        return;
    };
    if !screen.visible {
        return;
    }

    let text = format!(
        "{}\n{}  ·  {}\n{} links",
        truncate_label(&node.label, 48),
        node.id,
        node.kind,
        frame.graph.degree(index)
    );
    let galley = painter.layout_no_wrap(text, FontId::proportional(12.5), Color32::from_gray(240));
    let padding = vec2(8.0, 6.0);
    let size = galley.size() + padding * 2.0;
    let anchor = tooltip_anchor(frame.rect, to_pos2(screen.center), screen.radius, size);
    let background = Rect::from_min_size(anchor, size);

    painter.rect_filled(
        background,
        5.0,
        Color32::from_rgba_unmultiplied(24, 29, 38, 235),
    );
    painter.galley(anchor + padding, galley, Color32::from_gray(240));
}

#[cfg(test)]
mod tests {
    use dmsms_graph::engine::ScreenNode;

    use super::*;

    fn screen(depths: &[f32]) -> ScreenSpace {
        ScreenSpace {
            viewport_min: glam::Vec2::ZERO,
            viewport_size: glam::Vec2::splat(100.0),
            nodes: depths
                .iter()
                .map(|depth| ScreenNode {
                    center: glam::Vec2::splat(50.0),
                    radius: 5.0,
                    depth: *depth,
                    visible: *depth >= 0.0,
                })
                .collect(),
        }
    }

    #[test]
    fn draw_order_is_far_to_near_and_skips_hidden() {
        assert_eq!(draw_order(&screen(&[3.0, 9.0, -1.0, 5.0])), vec![1, 3, 0]);
    }

    #[test]
    fn invalid_three_d_camera_falls_back_to_flat() {
        let camera = CameraConfig {
            near: 50.0,
            far: 10.0,
            ..CameraConfig::default()
        };
        let (backend, error) = make_backend(Dimension::Three, &camera);
        assert_eq!(backend.kind(), Dimension::Two);
        assert_eq!(error, Some(BackendError::ClipPlanes { near: 50.0, far: 10.0 }));

        let (backend, error) = make_backend(Dimension::Three, &CameraConfig::default());
        assert_eq!(backend.kind(), Dimension::Three);
        assert_eq!(error, None);
    }
}
