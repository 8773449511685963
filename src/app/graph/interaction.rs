use eframe::egui::{self, Rect, Ui};

use dmsms_graph::engine::{PointerEvent, PointerOutcome};

use super::super::ViewModel;
use super::super::render_utils::to_glam;

impl ViewModel {
    pub(in crate::app) fn handle_graph_zoom(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        if !response.hovered() {
            return;
        }

        let scroll = ui.input(|input| input.raw_scroll_delta.y);
        if scroll.abs() <= f32::EPSILON {
            return;
        }

        let pointer = ui
            .input(|input| input.pointer.hover_pos())
            .unwrap_or_else(|| rect.center());
        self.backend.zoom(to_glam(pointer), scroll);
    }

    /// Secondary and middle drags always move the camera, even over a node.
    pub(in crate::app) fn handle_graph_pan(&mut self, response: &egui::Response) {
        if response.dragged_by(egui::PointerButton::Secondary)
            || response.dragged_by(egui::PointerButton::Middle)
        {
            self.backend.camera_drag(to_glam(response.drag_delta().to_pos2()));
        }
    }

    /// Turns this frame's primary-button state into engine pointer events,
    /// in press, move, release order. Background drags come back from the
    /// engine as camera motion.
    pub(in crate::app) fn handle_graph_pointer(&mut self, ui: &Ui, rect: Rect, response: &egui::Response) {
        let (latest, pressed, released) = ui.input(|input| {
            (
                input.pointer.latest_pos(),
                input.pointer.primary_pressed(),
                input.pointer.primary_released(),
            )
        });

        let mut events = Vec::with_capacity(3);
        if let Some(position) = latest {
            let pointer = to_glam(position);
            if pressed && response.hovered() {
                events.push(PointerEvent::Pressed(pointer));
                self.pointer_captured = true;
            }
            if self.pointer_captured || rect.contains(position) {
                events.push(PointerEvent::Moved(pointer));
            } else if self.engine.interaction().hovered.is_some() {
                events.push(PointerEvent::Left);
            }
            if released && self.pointer_captured {
                events.push(PointerEvent::Released(pointer));
                self.pointer_captured = false;
            }
        } else if self.engine.interaction().hovered.is_some() {
            events.push(PointerEvent::Left);
        }

        for event in events {
            let outcome = self.engine.handle_pointer(event, &self.screen, self.backend.projector());
            self.apply_pointer_outcome(outcome);
        }

        let cursor = if self.engine.is_dragging_node() {
            Some(egui::CursorIcon::Grabbing)
        } else if self.engine.interaction().hovered.is_some() {
            Some(egui::CursorIcon::PointingHand)
        } else {
            None
        };
        if let Some(cursor) = cursor {
            ui.output_mut(|output| output.cursor_icon = cursor);
        }
    }

    fn apply_pointer_outcome(&mut self, outcome: PointerOutcome) {
        if let Some(delta) = outcome.camera_drag {
            self.backend.camera_drag(delta);
        }
    }
}
