use eframe::egui::{Color32, Painter, Rect, pos2};
use glam::{Mat4, Vec2, Vec3};

use dmsms_graph::config::CameraConfig;
use dmsms_graph::engine::physics::{Body, Dimension};
use dmsms_graph::engine::{Projector, ScreenNode, ScreenSpace};

use super::super::render_utils::{circle_visible, to_pos2};
use super::{BackendError, RenderBackend};

const MAX_PITCH: f32 = 1.45;
const ORBIT_SPEED: f32 = 0.008;
/// Seconds without camera input before auto-rotation resumes.
const AUTO_ROTATE_RESUME_SECS: f32 = 2.5;

/// Perspective orbit camera around a target point.
pub(in crate::app) struct SceneBackend {
    rect: Rect,
    fov_y: f32,
    near: f32,
    far: f32,
    yaw: f32,
    pitch: f32,
    distance: f32,
    home_pitch: f32,
    target: Vec3,
    auto_rotate: bool,
    auto_rotate_speed: f32,
    idle_secs: f32,
    eye: Vec3,
    view_proj: Mat4,
    inverse: Mat4,
}

impl SceneBackend {
    pub(in crate::app) fn new(config: &CameraConfig) -> Result<Self, BackendError> {
        let fov = config.fov_y_degrees;
        if !fov.is_finite() || !(1.0..=179.0).contains(&fov) {
            return Err(BackendError::FieldOfView(fov));
        }
        let (near, far) = (config.near, config.far);
        if !near.is_finite() || !far.is_finite() || near <= 0.0 || near >= far {
            return Err(BackendError::ClipPlanes { near, far });
        }
        if !config.distance.is_finite() || config.distance <= near || config.distance >= far {
            return Err(BackendError::CameraDistance(config.distance));
        }

        let mut backend = Self {
            rect: Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
            fov_y: fov.to_radians(),
            near,
            far,
            yaw: 0.0,
            pitch: config.pitch.clamp(-MAX_PITCH, MAX_PITCH),
            distance: config.distance,
            home_pitch: config.pitch.clamp(-MAX_PITCH, MAX_PITCH),
            target: Vec3::ZERO,
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            idle_secs: AUTO_ROTATE_RESUME_SECS,
            eye: Vec3::ZERO,
            view_proj: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
        };
        backend.rebuild()?;
        Ok(backend)
    }

    fn rebuild(&mut self) -> Result<(), BackendError> {
        let aspect = if self.rect.height() > 0.0 && self.rect.width() > 0.0 {
            self.rect.width() / self.rect.height()
        } else {
            1.0
        };
        let orbit = Vec3::new(
            self.pitch.cos() * self.yaw.sin(),
            self.pitch.sin(),
            self.pitch.cos() * self.yaw.cos(),
        );
        self.eye = self.target + orbit * self.distance;

        let view = Mat4::look_at_rh(self.eye, self.target, Vec3::Y);
        let projection = Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far);
        self.view_proj = projection * view;
        self.inverse = self.view_proj.inverse();

        if self.view_proj.is_finite() && self.inverse.is_finite() {
            Ok(())
        } else {
            Err(BackendError::Degenerate)
        }
    }

    /// Pixels per world unit at distance 1.
    fn focal_length(&self) -> f32 {
        self.rect.height() * 0.5 / (self.fov_y * 0.5).tan()
    }

    fn ndc_of(&self, screen: Vec2) -> Option<Vec2> {
        let (width, height) = (self.rect.width(), self.rect.height());
        if width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(Vec2::new(
            (screen.x - self.rect.left()) / width * 2.0 - 1.0,
            1.0 - (screen.y - self.rect.top()) / height * 2.0,
        ))
    }

    fn touch(&mut self) {
        self.idle_secs = 0.0;
    }
}

impl Projector for SceneBackend {
    /// Intersects the pointer ray with the plane through `reference` that
    /// faces the camera, so dragged nodes keep their depth.
    fn unproject(&self, screen: Vec2, reference: Vec3) -> Option<Vec3> {
        if !screen.is_finite() || !reference.is_finite() {
            return None;
        }
        let ndc = self.ndc_of(screen)?;
        let near_point = self.inverse.project_point3(ndc.extend(0.0));
        let far_point = self.inverse.project_point3(ndc.extend(1.0));
        let direction = (far_point - near_point).normalize_or_zero();
        let forward = (self.target - self.eye).normalize_or_zero();

        let facing = direction.dot(forward);
        if facing.abs() < 1e-6 {
            return None;
        }
        let t = (reference - near_point).dot(forward) / facing;
        let point = near_point + direction * t;
        point.is_finite().then_some(point)
    }
}

impl RenderBackend for SceneBackend {
    fn projector(&self) -> &dyn Projector {
        self
    }

    fn kind(&self) -> Dimension {
        Dimension::Three
    }

    fn prepare(&mut self, rect: Rect, dt: f32) -> Result<(), BackendError> {
        self.rect = rect;
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.idle_secs += dt;
        if self.auto_rotate && self.idle_secs >= AUTO_ROTATE_RESUME_SECS {
            self.yaw = (self.yaw + self.auto_rotate_speed * dt) % std::f32::consts::TAU;
        }
        self.rebuild()
    }

    fn project(&self, bodies: &[Body]) -> ScreenSpace {
        let focal = self.focal_length();
        let hidden = ScreenNode {
            center: Vec2::NAN,
            radius: 0.0,
            depth: f32::INFINITY,
            visible: false,
        };

        let nodes = bodies
            .iter()
            .map(|body| {
                let clip = self.view_proj * body.position.extend(1.0);
                if !clip.is_finite() || clip.w <= self.near {
                    return hidden;
                }
                let ndc = clip.truncate() / clip.w;
                let center = Vec2::new(
                    self.rect.left() + (ndc.x + 1.0) * 0.5 * self.rect.width(),
                    self.rect.top() + (1.0 - ndc.y) * 0.5 * self.rect.height(),
                );
                let radius = (body.radius * focal / clip.w).clamp(1.0, 60.0);
                ScreenNode {
                    center,
                    radius,
                    depth: clip.w,
                    visible: (0.0..=1.0).contains(&ndc.z)
                        && circle_visible(self.rect, to_pos2(center), radius),
                }
            })
            .collect();

        ScreenSpace {
            viewport_min: Vec2::new(self.rect.left(), self.rect.top()),
            viewport_size: Vec2::new(self.rect.width(), self.rect.height()),
            nodes,
        }
    }

    fn camera_drag(&mut self, delta: Vec2) {
        self.touch();
        self.yaw -= delta.x * ORBIT_SPEED;
        self.pitch = (self.pitch + delta.y * ORBIT_SPEED).clamp(-MAX_PITCH, MAX_PITCH);
    }

    fn zoom(&mut self, _pointer: Vec2, scroll: f32) {
        if scroll.abs() <= f32::EPSILON {
            return;
        }
        self.touch();
        let factor = (1.0 - scroll * 0.0018).clamp(0.85, 1.15);
        self.distance = (self.distance * factor).clamp(self.near * 4.0, self.far * 0.5);
    }

    fn reset_camera(&mut self, bodies: &[Body]) {
        self.touch();
        self.yaw = 0.0;
        self.pitch = self.home_pitch;

        let mut points = bodies
            .iter()
            .map(|body| body.position)
            .filter(|position| position.is_finite());
        let Some(first) = points.next() else {
            self.target = Vec3::ZERO;
            return;
        };
        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        self.target = (min + max) * 0.5;

        let extent = bodies
            .iter()
            .filter(|body| body.position.is_finite())
            .map(|body| body.position.distance(self.target) + body.radius)
            .fold(0.0_f32, f32::max)
            + 40.0;
        self.distance = (extent / (self.fov_y * 0.5).sin()).clamp(self.near * 4.0, self.far * 0.5);
    }

    fn draw_background(&self, painter: &Painter) {
        painter.rect_filled(self.rect, 0.0, Color32::from_rgb(11, 14, 20));
        painter.circle_filled(
            self.rect.center(),
            self.rect.width().min(self.rect.height()) * 0.48,
            Color32::from_rgba_unmultiplied(30, 38, 52, 40),
        );
    }

    fn shaded_nodes(&self) -> bool {
        true
    }

    fn is_animating(&self) -> bool {
        self.auto_rotate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> SceneBackend {
        let mut backend = SceneBackend::new(&CameraConfig {
            auto_rotate: false,
            ..CameraConfig::default()
        })
        .unwrap();
        backend
            .prepare(Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0)), 0.016)
            .unwrap();
        backend
    }

    #[test]
    fn invalid_cameras_are_rejected() {
        let fov = CameraConfig {
            fov_y_degrees: 0.0,
            ..CameraConfig::default()
        };
        assert_eq!(SceneBackend::new(&fov).err(), Some(BackendError::FieldOfView(0.0)));

        let planes = CameraConfig {
            near: 0.0,
            ..CameraConfig::default()
        };
        assert!(matches!(
            SceneBackend::new(&planes),
            Err(BackendError::ClipPlanes { .. })
        ));

        let distance = CameraConfig {
            distance: 0.5,
            ..CameraConfig::default()
        };
        assert_eq!(
            SceneBackend::new(&distance).err(),
            Some(BackendError::CameraDistance(0.5))
        );
    }

    #[test]
    fn origin_projects_to_the_viewport_centre() {
        let space = backend().project(&[Body::at(Vec3::ZERO, 10.0)]);
        let node = space.nodes[0];
        assert!(node.visible);
        assert!((node.center - Vec2::new(400.0, 300.0)).length() < 1e-2);
    }

    #[test]
    fn unprojecting_keeps_the_reference_depth() {
        let backend = backend();
        let reference = Vec3::new(60.0, -40.0, 120.0);
        let screen = backend.project(&[Body::at(reference, 5.0)]).nodes[0].center;
        let world = backend.unproject(screen, reference).unwrap();
        assert!((world - reference).length() < 0.5, "{world:?}");
    }

    #[test]
    fn nearer_bodies_are_larger_and_behind_is_hidden() {
        let backend = backend();
        let toward_camera = backend.eye * 0.5;
        let behind = backend.eye * 2.0;
        let space = backend.project(&[
            Body::at(Vec3::ZERO, 10.0),
            Body::at(toward_camera, 10.0),
            Body::at(behind, 10.0),
        ]);
        assert!(space.nodes[1].radius > space.nodes[0].radius);
        assert!(space.nodes[1].depth < space.nodes[0].depth);
        assert!(!space.nodes[2].visible);
    }

    #[test]
    fn auto_rotation_waits_for_idle_camera() {
        let mut backend = SceneBackend::new(&CameraConfig::default()).unwrap();
        let rect = Rect::from_min_max(pos2(0.0, 0.0), pos2(800.0, 600.0));
        backend.prepare(rect, 0.1).unwrap();
        let turning = backend.yaw;
        assert!(turning > 0.0);

        backend.camera_drag(Vec2::ZERO);
        let held = backend.yaw;
        backend.prepare(rect, 0.1).unwrap();
        assert_eq!(backend.yaw, held);
    }
}
