use eframe::egui::Context;

use dmsms_graph::engine::physics::SimulationMode;

use super::super::ViewModel;

const FPS_SAMPLE_WINDOW: usize = 180;

impl ViewModel {
    pub(in crate::app) fn update_fps_counter(&mut self, ctx: &Context) {
        let dt = ctx.input(|input| input.stable_dt);
        if dt <= f32::EPSILON {
            return;
        }

        self.fps_current = (1.0 / dt).clamp(0.0, 1000.0);
        self.fps_samples.push_back(self.fps_current);
        while self.fps_samples.len() > FPS_SAMPLE_WINDOW {
            self.fps_samples.pop_front();
        }
    }

    pub(in crate::app) fn fps_display_text(&self) -> Option<String> {
        if !self.show_fps_bar || self.fps_samples.is_empty() {
            return None;
        }

        let avg = self.fps_samples.iter().sum::<f32>() / self.fps_samples.len() as f32;
        let low = self
            .fps_samples
            .iter()
            .copied()
            .reduce(f32::min)
            .unwrap_or(self.fps_current);
        Some(format!(
            "FPS {:.0} | avg {avg:.1} | low {low:.0} | {:.1} ms",
            self.fps_current,
            1000.0 / self.fps_current.max(f32::EPSILON)
        ))
    }

    pub(in crate::app) fn visible_graph_text(&self) -> String {
        format!(
            "visible: {} nodes / {} links | {}",
            self.visible_node_count.min(self.engine.graph().node_count()),
            self.visible_edge_count.min(self.engine.graph().link_count()),
            match self.engine.mode() {
                SimulationMode::Running => "settling",
                SimulationMode::Settled => "settled",
            }
        )
    }
}
