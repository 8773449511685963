use eframe::egui::{Painter, Pos2, Rect, Vec2, vec2};
use glam::Vec3;

use dmsms_graph::engine::physics::{Body, Dimension};
use dmsms_graph::engine::{Projector, ScreenNode, ScreenSpace};

use super::super::render_utils::{circle_visible, draw_background, to_glam, to_pos2};
use super::{BackendError, RenderBackend};

const MIN_ZOOM: f32 = 0.05;
const MAX_ZOOM: f32 = 6.0;

/// Orthographic pan/zoom view of the x/y plane.
pub(in crate::app) struct FlatBackend {
    rect: Rect,
    pan: Vec2,
    zoom: f32,
}

impl FlatBackend {
    pub(in crate::app) fn new() -> Self {
        Self {
            rect: Rect::ZERO,
            pan: Vec2::ZERO,
            zoom: 1.0,
        }
    }

    fn world_to_screen(&self, world: Vec3) -> Pos2 {
        self.rect.center() + self.pan + vec2(world.x, world.y) * self.zoom
    }

    fn screen_to_world(&self, screen: Pos2) -> Vec2 {
        (screen - self.rect.center() - self.pan) / self.zoom
    }
}

impl Projector for FlatBackend {
    fn unproject(&self, screen: glam::Vec2, _reference: Vec3) -> Option<Vec3> {
        if !screen.is_finite() || self.zoom <= 0.0 {
            return None;
        }
        let world = self.screen_to_world(to_pos2(screen));
        Some(Vec3::new(world.x, world.y, 0.0))
    }
}

impl RenderBackend for FlatBackend {
    fn projector(&self) -> &dyn Projector {
        self
    }

    fn kind(&self) -> Dimension {
        Dimension::Two
    }

    fn prepare(&mut self, rect: Rect, _dt: f32) -> Result<(), BackendError> {
        self.rect = rect;
        Ok(())
    }

    fn project(&self, bodies: &[Body]) -> ScreenSpace {
        let nodes = bodies
            .iter()
            .map(|body| {
                let center = self.world_to_screen(body.position);
                let radius = (body.radius * self.zoom.powf(0.40)).clamp(2.5, 46.0);
                ScreenNode {
                    center: to_glam(center),
                    radius,
                    depth: 0.0,
                    visible: center.is_finite() && circle_visible(self.rect, center, radius),
                }
            })
            .collect();

        ScreenSpace {
            viewport_min: to_glam(self.rect.min),
            viewport_size: glam::Vec2::new(self.rect.width(), self.rect.height()),
            nodes,
        }
    }

    fn camera_drag(&mut self, delta: glam::Vec2) {
        self.pan += vec2(delta.x, delta.y);
    }

    fn zoom(&mut self, pointer: glam::Vec2, scroll: f32) {
        if scroll.abs() <= f32::EPSILON {
            return;
        }
        let pointer = to_pos2(pointer);
        let world_before = self.screen_to_world(pointer);

        let zoom_factor = (1.0 + (scroll * 0.0018)).clamp(0.85, 1.15);
        self.zoom = (self.zoom * zoom_factor).clamp(MIN_ZOOM, MAX_ZOOM);
        self.pan = pointer - self.rect.center() - (world_before * self.zoom);
    }

    fn reset_camera(&mut self, bodies: &[Body]) {
        let mut points = bodies
            .iter()
            .map(|body| body.position)
            .filter(|position| position.is_finite());
        let Some(first) = points.next() else {
            self.pan = Vec2::ZERO;
            self.zoom = 1.0;
            return;
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));

        let extent = (max - min).truncate().max(glam::Vec2::splat(1.0)) + glam::Vec2::splat(80.0);
        let size = self.rect.size();
        self.zoom = if size.x > 0.0 && size.y > 0.0 {
            (size.x / extent.x).min(size.y / extent.y).clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            1.0
        };
        let middle = (min + max) * 0.5;
        self.pan = -vec2(middle.x, middle.y) * self.zoom;
    }

    fn draw_background(&self, painter: &Painter) {
        draw_background(painter, self.rect, self.pan, 48.0 * self.zoom);
    }
}

#[cfg(test)]
mod tests {
    use eframe::egui::pos2;

    use super::*;

    fn body(x: f32, y: f32) -> Body {
        Body::at(Vec3::new(x, y, 0.0), 8.0)
    }

    fn backend() -> FlatBackend {
        let mut backend = FlatBackend::new();
        backend
            .prepare(Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0)), 0.016)
            .unwrap();
        backend
    }

    #[test]
    fn projection_and_unprojection_agree() {
        let mut backend = backend();
        backend.camera_drag(glam::Vec2::new(30.0, -12.0));
        backend.zoom(glam::Vec2::new(200.0, 150.0), 120.0);

        let space = backend.project(&[body(40.0, -25.0)]);
        let world = backend
            .unproject(space.nodes[0].center, Vec3::ZERO)
            .unwrap();
        assert!((world - Vec3::new(40.0, -25.0, 0.0)).length() < 1e-3);
    }

    #[test]
    fn zoom_keeps_the_point_under_the_cursor() {
        let mut backend = backend();
        let pointer = glam::Vec2::new(600.0, 100.0);
        let before = backend.unproject(pointer, Vec3::ZERO).unwrap();
        backend.zoom(pointer, 300.0);
        let after = backend.unproject(pointer, Vec3::ZERO).unwrap();
        assert!((before - after).length() < 1e-3);
    }

    #[test]
    fn reset_frames_every_body() {
        let mut backend = backend();
        let bodies = [body(-900.0, 0.0), body(900.0, 400.0), body(0.0, -300.0)];
        backend.reset_camera(&bodies);
        let space = backend.project(&bodies);
        assert!(space.nodes.iter().all(|node| node.visible));
    }
}
