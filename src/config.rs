//! Tunable engine configuration.
//!
//! Every constant that shapes the layout, hit-testing or drawing lives here so
//! it can be overridden from a JSON file passed with `--config`. Missing fields
//! fall back to the defaults below; out-of-range values are clamped by
//! [`EngineConfig::validated`].

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub physics: PhysicsConfig,
    pub interaction: InteractionConfig,
    pub render: RenderConfig,
    pub camera: CameraConfig,
    pub subset: SubsetConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub intensity: f32,
    pub repulsion_scale: f32,
    pub spring_scale: f32,
    pub collision_scale: f32,
    pub velocity_damping: f32,
    /// Multiplier on `r_i + r_j` giving the minimum centre distance.
    pub collision_padding: f32,
    pub center_pull: f32,
    /// Radius of the slow orbit traced by the layout centre.
    pub breathing_radius: f32,
    pub breathing_period_secs: f32,
    /// Amplitude of the per-node ambient wobble.
    pub jitter: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
    pub alpha_target: f32,
    pub reheat_alpha: f32,
    /// Rest length for link kinds missing from `rest_lengths`.
    pub default_rest_length: f32,
    pub rest_lengths: BTreeMap<String, f32>,
    /// Node count above which 2D repulsion switches to Barnes-Hut.
    pub barnes_hut_threshold: usize,
    pub barnes_hut_theta: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        let rest_lengths = [
            ("alternate_for", 48.0),
            ("contains", 56.0),
            ("supplied_by", 90.0),
            ("affects", 80.0),
            ("uses", 110.0),
            ("cites", 170.0),
        ]
        .into_iter()
        .map(|(kind, length)| (kind.to_owned(), length))
        .collect();

        Self {
            intensity: 1.0,
            repulsion_scale: 1.0,
            spring_scale: 1.0,
            collision_scale: 1.0,
            velocity_damping: 0.88,
            collision_padding: 1.6,
            center_pull: 0.0016,
            breathing_radius: 18.0,
            breathing_period_secs: 40.0,
            jitter: 0.35,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
            alpha_target: 0.0,
            reheat_alpha: 1.0,
            default_rest_length: 100.0,
            rest_lengths,
            barnes_hut_threshold: 160,
            barnes_hut_theta: 0.72,
        }
    }
}

impl PhysicsConfig {
    pub fn rest_length(&self, kind: &str) -> f32 {
        self.rest_lengths
            .get(kind)
            .copied()
            .unwrap_or(self.default_rest_length)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Pointer travel below this many pixels turns a drag into a click.
    pub click_threshold_px: f32,
    pub proximity_fraction: f32,
    pub proximity_min_px: f32,
    pub proximity_max_px: f32,
    /// Opacity multiplier for nodes and edges outside the focus.
    pub dim_factor: f32,
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            click_threshold_px: 4.0,
            proximity_fraction: 0.14,
            proximity_min_px: 24.0,
            proximity_max_px: 72.0,
            dim_factor: 0.3,
        }
    }
}

impl InteractionConfig {
    pub fn proximity_radius(&self, viewport_min_dimension: f32) -> f32 {
        (viewport_min_dimension.max(0.0) * self.proximity_fraction)
            .clamp(self.proximity_min_px, self.proximity_max_px)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub min_node_radius: f32,
    pub max_node_radius: f32,
    pub base_edge_width: f32,
    pub particles_per_edge: usize,
    pub particle_speed: f32,
    pub label_max_chars: usize,
    /// Nodes larger than this on screen always get a label.
    pub label_radius_px: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_node_radius: 5.0,
            max_node_radius: 22.0,
            base_edge_width: 1.1,
            particles_per_edge: 2,
            particle_speed: 0.35,
            label_max_chars: 28,
            label_radius_px: 15.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    pub distance: f32,
    pub pitch: f32,
    pub auto_rotate: bool,
    /// Radians per second while auto-rotating.
    pub auto_rotate_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_degrees: 55.0,
            near: 1.0,
            far: 20_000.0,
            distance: 900.0,
            pitch: 0.35,
            auto_rotate: true,
            auto_rotate_speed: 0.12,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsetConfig {
    pub max_nodes: usize,
}

impl Default for SubsetConfig {
    fn default() -> Self {
        Self { max_nodes: 220 }
    }
}

impl EngineConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("invalid engine config in {}", path.display()))?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config.validated())
    }

    /// Clamps every field into the range the engine stays stable in.
    pub fn validated(mut self) -> Self {
        let physics = &mut self.physics;
        physics.intensity = physics.intensity.clamp(0.2, 2.5);
        physics.repulsion_scale = physics.repulsion_scale.clamp(0.25, 2.6);
        physics.spring_scale = physics.spring_scale.clamp(0.2, 2.2);
        physics.collision_scale = physics.collision_scale.clamp(0.2, 2.0);
        physics.velocity_damping = physics.velocity_damping.clamp(0.5, 0.97);
        physics.collision_padding = physics.collision_padding.clamp(1.0, 4.0);
        physics.center_pull = physics.center_pull.clamp(0.0, 0.05);
        physics.breathing_radius = physics.breathing_radius.clamp(0.0, 200.0);
        physics.breathing_period_secs = physics.breathing_period_secs.max(1.0);
        physics.jitter = physics.jitter.clamp(0.0, 5.0);
        physics.alpha_decay = physics.alpha_decay.clamp(0.0001, 0.5);
        physics.alpha_min = physics.alpha_min.clamp(0.0, 0.5);
        physics.alpha_target = physics.alpha_target.clamp(0.0, 1.0);
        physics.reheat_alpha = physics.reheat_alpha.clamp(physics.alpha_min, 1.0);
        physics.default_rest_length = physics.default_rest_length.clamp(10.0, 600.0);
        for length in physics.rest_lengths.values_mut() {
            *length = length.clamp(10.0, 600.0);
        }
        physics.barnes_hut_theta = physics.barnes_hut_theta.clamp(0.2, 1.5);

        let interaction = &mut self.interaction;
        interaction.click_threshold_px = interaction.click_threshold_px.clamp(0.0, 32.0);
        interaction.proximity_fraction = interaction.proximity_fraction.clamp(0.0, 0.5);
        interaction.proximity_min_px = interaction.proximity_min_px.max(0.0);
        interaction.proximity_max_px = interaction
            .proximity_max_px
            .max(interaction.proximity_min_px);
        interaction.dim_factor = interaction.dim_factor.clamp(0.05, 1.0);

        let render = &mut self.render;
        render.min_node_radius = render.min_node_radius.clamp(1.0, 40.0);
        render.max_node_radius = render.max_node_radius.max(render.min_node_radius);
        render.base_edge_width = render.base_edge_width.clamp(0.2, 8.0);
        render.particles_per_edge = render.particles_per_edge.min(8);
        render.particle_speed = render.particle_speed.clamp(0.0, 4.0);

        self.subset.max_nodes = self.subset.max_nodes.max(1);
        self
    }
}
