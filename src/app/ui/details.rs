use eframe::egui::{self, RichText, Ui};

use dmsms_graph::engine::InteractionMode;
use dmsms_graph::util::truncate_label;

use super::super::ViewModel;

struct NeighborEntry {
    id: String,
    label: String,
    kind: String,
    link_kind: String,
}

fn mode_caption(mode: &InteractionMode) -> &'static str {
    match mode {
        InteractionMode::Locked(_) => "Locked: click it again or the background to release.",
        InteractionMode::Dragging(_) => "Dragging",
        InteractionMode::Hovering(_) => "Hovered",
        InteractionMode::Idle => "",
    }
}

impl ViewModel {
    pub(in crate::app) fn draw_details(&mut self, ui: &mut Ui) {
        ui.heading("Node Details");
        ui.add_space(6.0);

        egui::ScrollArea::vertical()
            .id_salt("details_scroll")
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.draw_focus(ui);
                ui.separator();
                self.draw_integrity(ui);
            });
    }

    fn draw_focus(&mut self, ui: &mut Ui) {
        let state = self.engine.interaction();
        let Some(focus_id) = state.focus().map(str::to_owned) else {
            ui.label("Hover a node to inspect it, click to lock it.");
            return;
        };
        let mode = state.mode();
        let locked = state.locked.is_some();

        let graph = self.engine.graph();
        let Some(index) = graph.index_of(&focus_id) else {
            ui.label("The focused node is no longer in view.");
            return;
        };
        let node = &graph.nodes()[index];
        let pinned = node.pinned;

        ui.label(RichText::new(truncate_label(&node.label, 64)).strong());
        ui.small(node.id.as_str());
        ui.add_space(6.0);
        ui.label(format!("Kind: {}", node.kind));
        ui.label(format!("Links: {}", graph.degree(index)));
        ui.label(mode_caption(&mode));

        let neighbors = Self::neighbor_entries(graph, index);

        if locked {
            ui.horizontal(|ui| {
                let fix_label = if pinned { "Release position" } else { "Fix position" };
                if ui
                    .button(fix_label)
                    .on_hover_text("Fixed nodes ignore layout forces.")
                    .clicked()
                {
                    self.engine.toggle_fixed(&focus_id);
                }
                if ui.button("Unlock").clicked() {
                    self.engine.lock(None);
                }
            });
        }

        ui.separator();
        ui.label(RichText::new(format!("Neighbours ({})", neighbors.len())).strong());
        if neighbors.is_empty() {
            ui.label("This node has no links in the current view.");
            return;
        }

        let row_count = neighbors.len().min(self.neighbor_rows_visible);
        let mut should_load_more = false;
        let mut chosen = None;

        egui::ScrollArea::vertical()
            .id_salt("neighbor_scroll")
            .max_height(320.0)
            .auto_shrink([false, false])
            .show_rows(ui, 22.0, row_count, |ui, row_range| {
                if row_range.end + Self::NEIGHBOR_PREFETCH_MARGIN >= row_count {
                    should_load_more = true;
                }

                for row in row_range {
                    let Some(entry) = neighbors.get(row) else {
                        continue;
                    };
                    let text = format!(
                        "{}  [{}, {}]",
                        truncate_label(&entry.label, 32),
                        entry.kind,
                        entry.link_kind
                    );
                    if ui.link(text).on_hover_text(entry.id.as_str()).clicked() {
                        chosen = Some(entry.id.clone());
                    }
                }
            });

        if should_load_more && row_count < neighbors.len() {
            self.neighbor_rows_visible = (row_count + Self::NEIGHBOR_PAGE_ROWS).min(neighbors.len());
        }
        if let Some(id) = chosen {
            self.engine.lock(Some(&id));
        }
    }

    fn neighbor_entries(graph: &dmsms_graph::graph::Graph, index: usize) -> Vec<NeighborEntry> {
        let focus_id = &graph.nodes()[index].id;
        let mut entries = graph
            .neighbors(index)
            .iter()
            .filter_map(|&neighbor| graph.nodes().get(neighbor))
            .map(|node| {
                let link_kind = graph
                    .links()
                    .iter()
                    .find(|link| link.touches(focus_id) && link.touches(&node.id))
                    .map_or_else(String::new, |link| link.kind.clone());
                NeighborEntry {
                    id: node.id.clone(),
                    label: node.label.clone(),
                    kind: node.kind.clone(),
                    link_kind,
                }
            })
            .collect::<Vec<_>>();
        entries.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.label.cmp(&b.label)));
        entries
    }

    fn draw_integrity(&self, ui: &mut Ui) {
        ui.label(RichText::new("Data integrity").strong());
        ui.label(format!(
            "Loaded {} of {} nodes in {} ms.",
            self.engine.graph().node_count(),
            self.engine.full_graph().node_count(),
            self.load_elapsed.as_millis()
        ));
        if self.report.is_clean() && self.report.self_loops == 0 {
            ui.label("No problems found in the source data.");
            return;
        }
        if self.report.missing_endpoints > 0 {
            ui.label(format!(
                "- {} links referenced unknown nodes and were dropped",
                self.report.missing_endpoints
            ));
        }
        if self.report.duplicate_ids > 0 {
            ui.label(format!("- {} duplicate node ids kept their first occurrence", self.report.duplicate_ids));
        }
        if self.report.self_loops > 0 {
            ui.label(format!("- {} self-links carry no layout force", self.report.self_loops));
        }
    }
}
