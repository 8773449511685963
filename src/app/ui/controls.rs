use std::ops::RangeInclusive;

use chrono::Utc;
use eframe::egui::{self, Key, Response, Ui};
use tracing::{info, warn};

use dmsms_graph::engine::physics::Dimension;
use dmsms_graph::util::truncate_label;

use super::super::notices::Notices;
use super::super::{FrameRequests, ViewModel};

const SLIDER_KEY_BASE_RATE: f32 = 10.0;
const SLIDER_KEY_ACCEL_PER_SEC: f32 = 9.0;
const SLIDER_KEY_ACCEL_MAX: f32 = 40.0;
const SEARCH_RESULT_ROWS: usize = 12;

#[derive(Clone, Copy, Default)]
struct SliderKeyHoldState {
    positive_secs: f32,
    negative_secs: f32,
    integer_carry: f32,
}

fn slider_key_accel_multiplier(hold_secs: f32) -> f32 {
    let ramp = hold_secs * SLIDER_KEY_ACCEL_PER_SEC;
    (1.0 + ramp + ramp * ramp * 0.15).min(SLIDER_KEY_ACCEL_MAX)
}

fn default_slider_key_step(min: f32, max: f32) -> f32 {
    ((max - min) / 200.0).max(0.0005)
}

/// Held arrow keys on a focused slider move it faster the longer they are
/// held. Returns this frame's signed movement in units of `step`, and hands
/// the hold state to `apply` so integer sliders can carry fractions.
fn arrow_key_hold(
    ui: &Ui,
    response: &Response,
    step: f32,
    apply: impl FnOnce(f32, &mut SliderKeyHoldState) -> bool,
) -> bool {
    let state_id = response.id.with("arrow_key_hold_state");
    let mut hold_state = ui
        .ctx()
        .data(|data| data.get_temp::<SliderKeyHoldState>(state_id).unwrap_or_default());

    if !response.has_focus() {
        ui.ctx()
            .data_mut(|data| data.insert_temp(state_id, SliderKeyHoldState::default()));
        return false;
    }

    let (delta_time, increase_down, decrease_down) = ui.input(|input| {
        (
            input.stable_dt.min(0.1),
            input.key_down(Key::ArrowRight) || input.key_down(Key::ArrowUp),
            input.key_down(Key::ArrowLeft) || input.key_down(Key::ArrowDown),
        )
    });

    hold_state.positive_secs = if increase_down { hold_state.positive_secs + delta_time } else { 0.0 };
    hold_state.negative_secs = if decrease_down { hold_state.negative_secs + delta_time } else { 0.0 };

    let direction = (increase_down as i8) - (decrease_down as i8);
    let changed = if direction == 0 {
        hold_state.integer_carry = 0.0;
        false
    } else {
        let hold_secs = if direction > 0 {
            hold_state.positive_secs
        } else {
            hold_state.negative_secs
        };
        let speed = SLIDER_KEY_BASE_RATE * slider_key_accel_multiplier(hold_secs);
        ui.ctx().request_repaint();
        apply(direction as f32 * step * speed * delta_time, &mut hold_state)
    };

    ui.ctx()
        .data_mut(|data| data.insert_temp(state_id, hold_state));
    changed
}

fn tuning_slider(
    ui: &mut Ui,
    value: &mut f32,
    range: RangeInclusive<f32>,
    text: &str,
    hover: &str,
) -> bool {
    let (min, max) = (*range.start(), *range.end());
    let response = ui
        .add(
            egui::Slider::new(value, range)
                .text(text)
                .clamping(egui::SliderClamping::Always),
        )
        .on_hover_text(hover);
    if response.hovered() {
        response.request_focus();
    }

    let mut changed = response.changed();
    changed |= arrow_key_hold(ui, &response, default_slider_key_step(min, max), |delta, _| {
        let old_value = *value;
        *value = (*value + delta).clamp(min, max);
        (*value - old_value).abs() > f32::EPSILON
    });
    changed
}

fn count_slider(ui: &mut Ui, value: &mut usize, max: usize, text: &str, hover: &str) -> bool {
    let response = ui
        .add(egui::Slider::new(value, 1..=max).step_by(5.0).text(text))
        .on_hover_text(hover);
    if response.hovered() {
        response.request_focus();
    }

    let mut changed = response.changed();
    changed |= arrow_key_hold(ui, &response, 5.0, |delta, hold_state| {
        hold_state.integer_carry += delta;
        let whole_delta = hold_state.integer_carry.trunc() as isize;
        hold_state.integer_carry -= whole_delta as f32;

        let old_value = *value;
        if whole_delta != 0 {
            *value = (*value as isize + whole_delta).clamp(1, max as isize) as usize;
        }
        *value != old_value
    });
    changed
}

impl ViewModel {
    pub(in crate::app) fn draw_controls(
        &mut self,
        ui: &mut Ui,
        notices: &mut Notices,
        requests: &mut FrameRequests,
    ) {
        ui.heading("Graph Controls");
        ui.separator();
        ui.add_space(4.0);

        self.draw_search(ui);
        ui.separator();

        ui.horizontal(|ui| {
            let mut dimension = self.backend.kind();
            ui.selectable_value(&mut dimension, Dimension::Two, "2D")
                .on_hover_text("Flat layout with pan and zoom.");
            ui.selectable_value(&mut dimension, Dimension::Three, "3D")
                .on_hover_text("Perspective layout with an orbiting camera.");
            if dimension != self.backend.kind() {
                self.switch_dimension(dimension, notices);
            }

            if ui
                .button("Reset view")
                .on_hover_text("Frame every node in the view.")
                .clicked()
            {
                self.camera_reset_requested = true;
            }
        });

        let full_count = self.engine.full_graph().node_count().max(1);
        let mut max_nodes = self.engine.config().subset.max_nodes.min(full_count);
        if count_slider(
            ui,
            &mut max_nodes,
            full_count,
            "Max nodes",
            "Largest connected neighbourhood drawn at once.",
        ) {
            self.engine.set_max_nodes(max_nodes);
            self.graph_changed();
        }

        ui.separator();

        ui.checkbox(&mut self.live_physics, "Live physics simulation")
            .on_hover_text("Keep simulating layout forces while viewing the graph.");
        ui.checkbox(&mut self.show_fps_bar, "FPS display")
            .on_hover_text("Show a live FPS readout in the header.");

        ui.collapsing("Physics tuning", |ui| {
            let mut changed = false;
            let physics = &mut self.engine.config_mut().physics;
            changed |= tuning_slider(
                ui,
                &mut physics.intensity,
                0.2..=2.5,
                "Intensity",
                "Overall strength applied to all physics forces.",
            );
            changed |= tuning_slider(
                ui,
                &mut physics.repulsion_scale,
                0.25..=2.6,
                "Repulsion",
                "How strongly nodes push away from each other.",
            );
            changed |= tuning_slider(
                ui,
                &mut physics.spring_scale,
                0.2..=2.2,
                "Link spring",
                "How strongly linked nodes pull toward their rest length.",
            );
            changed |= tuning_slider(
                ui,
                &mut physics.collision_scale,
                0.2..=2.0,
                "Collision",
                "Extra separation force between overlapping nodes.",
            );
            changed |= tuning_slider(
                ui,
                &mut physics.velocity_damping,
                0.5..=0.97,
                "Velocity damping",
                "How much velocity survives each step.",
            );
            changed |= tuning_slider(
                ui,
                &mut physics.jitter,
                0.0..=5.0,
                "Drift",
                "Gentle per-node motion that keeps a settled layout alive.",
            );
            changed |= tuning_slider(
                ui,
                &mut physics.breathing_radius,
                0.0..=200.0,
                "Breathing",
                "Radius of the slow orbit of the layout centre.",
            );

            let interaction = &mut self.engine.config_mut().interaction;
            tuning_slider(
                ui,
                &mut interaction.dim_factor,
                0.05..=1.0,
                "Dimming",
                "Opacity of nodes and links outside the focused neighbourhood.",
            );

            if changed {
                self.engine.reheat();
            }
            if ui.button("Reheat").clicked() {
                self.engine.reheat();
            }
        });

        ui.separator();

        ui.horizontal(|ui| {
            if ui
                .button("Copy graph JSON")
                .on_hover_text("Copy the visible graph with metadata to the clipboard.")
                .clicked()
            {
                self.export_to_clipboard(ui, notices);
            }
            if ui
                .button("Reload")
                .on_hover_text("Fetch the graph again from its source.")
                .clicked()
            {
                requests.reload = true;
            }
        });
    }

    fn draw_search(&mut self, ui: &mut Ui) {
        ui.label("Search (id or label)")
            .on_hover_text("Fuzzy-highlight matching nodes without changing the graph.");
        let search_response = ui
            .text_edit_singleline(&mut self.search)
            .on_hover_text("Type to highlight matches, then pick one to lock it.");
        let submitted = search_response.lost_focus() && ui.input(|input| input.key_pressed(Key::Enter));

        let Some((ranked, _)) = self.search_matches() else {
            return;
        };
        if ranked.is_empty() {
            ui.small("No matches.");
            return;
        }

        let mut chosen = submitted.then(|| ranked[0]);
        let locked = self.engine.interaction().locked.clone();
        for &index in ranked.iter().take(SEARCH_RESULT_ROWS) {
            let Some(node) = self.engine.graph().nodes().get(index) else {
                continue;
            };
            let is_locked = locked.as_deref() == Some(node.id.as_str());
            if ui
                .selectable_label(is_locked, truncate_label(&node.label, 36))
                .on_hover_text(format!("{} ({})", node.id, node.kind))
                .clicked()
            {
                chosen = Some(index);
            }
        }
        if ranked.len() > SEARCH_RESULT_ROWS {
            ui.small(format!("and {} more", ranked.len() - SEARCH_RESULT_ROWS));
        }

        if let Some(id) = chosen.and_then(|index| self.engine.graph().nodes().get(index).map(|node| node.id.clone())) {
            self.engine.lock(Some(&id));
        }
    }

    fn export_to_clipboard(&self, ui: &Ui, notices: &mut Notices) {
        match self.engine.export_json(Utc::now()) {
            Ok(json) => {
                ui.ctx().copy_text(json);
                info!(nodes = self.engine.graph().node_count(), "graph exported to clipboard");
                notices.success("Graph JSON copied to the clipboard.");
            }
            Err(error) => {
                warn!(%error, "graph export failed");
                notices.error(format!("Export failed: {error}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn held_keys_accelerate_up_to_a_cap() {
        assert_eq!(slider_key_accel_multiplier(0.0), 1.0);
        assert!(slider_key_accel_multiplier(0.5) > slider_key_accel_multiplier(0.1));
        assert_eq!(slider_key_accel_multiplier(60.0), SLIDER_KEY_ACCEL_MAX);
    }

    #[test]
    fn key_step_has_a_floor() {
        assert_eq!(default_slider_key_step(0.0, 2.0), 0.01);
        assert_eq!(default_slider_key_step(0.0, 0.0), 0.0005);
    }
}
