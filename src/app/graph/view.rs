use std::collections::HashSet;
use std::sync::Arc;

use eframe::egui::{Align2, Color32, FontId, Sense, Ui};
use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;
use tracing::warn;

use dmsms_graph::engine::physics::{Dimension, SimulationMode};

use super::super::notices::Notices;
use super::super::render::DrawFrame;
use super::super::{SearchMatchCache, ViewModel};

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

type SearchMatches = (Arc<Vec<usize>>, Arc<HashSet<usize>>);

impl ViewModel {
    /// Working-graph nodes whose label or id fuzzy-matches the search box,
    /// best first. Cached per query and graph revision.
    pub(in crate::app) fn search_matches(&mut self) -> Option<SearchMatches> {
        let query = self.search.trim();
        if query.is_empty() {
            return None;
        }

        if let Some(cached) = &self.search_match_cache
            && cached.graph_revision == self.graph_revision
            && cached.query == query
        {
            return Some((Arc::clone(&cached.ranked), Arc::clone(&cached.matches)));
        }

        let matcher = SkimMatcherV2::default();
        let mut scored = self
            .engine
            .graph()
            .nodes()
            .iter()
            .enumerate()
            .filter_map(|(index, node)| {
                let by_label = fuzzy_match_score(&matcher, &node.label, query);
                let by_id = fuzzy_match_score(&matcher, &node.id, query);
                by_label.max(by_id).map(|score| (index, score))
            })
            .collect::<Vec<_>>();
        scored.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

        let ranked = Arc::new(scored.iter().map(|(index, _)| *index).collect::<Vec<_>>());
        let matches = Arc::new(ranked.iter().copied().collect::<HashSet<_>>());
        self.search_match_cache = Some(SearchMatchCache {
            query: query.to_owned(),
            graph_revision: self.graph_revision,
            ranked: Arc::clone(&ranked),
            matches: Arc::clone(&matches),
        });

        Some((ranked, matches))
    }

    /// One frame of the canvas: camera, physics tick, projection, input,
    /// then drawing from the fresh projection.
    pub(in crate::app) fn draw_graph(&mut self, ui: &mut Ui, notices: &mut Notices) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let painter = ui.painter_at(rect);
        let dt = ui
            .ctx()
            .input(|input| input.stable_dt)
            .clamp(1.0 / 240.0, 1.0 / 20.0);
        self.time += dt;

        if self.camera_reset_requested {
            self.camera_reset_requested = false;
            self.backend.reset_camera(self.engine.bodies());
        }

        if let Err(error) = self.backend.prepare(rect, dt) {
            warn!(%error, "render backend failed; falling back to 2D");
            notices.warning(format!("3D view failed ({error}); showing 2D."));
            self.switch_dimension(Dimension::Two, notices);
            if let Err(error) = self.backend.prepare(rect, dt) {
                warn!(%error, "flat backend failed to prepare");
                return;
            }
        }

        self.handle_graph_zoom(ui, rect, &response);
        self.handle_graph_pan(&response);

        if self.engine.graph().is_empty() {
            self.backend.draw_background(&painter);
            painter.text(
                rect.center(),
                Align2::CENTER_CENTER,
                "No nodes to display.",
                FontId::proportional(15.0),
                Color32::from_gray(200),
            );
            self.visible_node_count = 0;
            self.visible_edge_count = 0;
            return;
        }

        let moving = self.live_physics && self.engine.tick(dt);

        self.screen = self.backend.project(self.engine.bodies());
        self.handle_graph_pointer(ui, rect, &response);
        if self.engine.is_dragging_node() {
            self.screen = self.backend.project(self.engine.bodies());
        }

        let highlight = self.engine.highlight();
        let matches = self.search_matches();
        let frame = DrawFrame {
            rect,
            graph: self.engine.graph(),
            bodies: self.engine.bodies(),
            space: &self.screen,
            highlight: &highlight,
            state: self.engine.interaction(),
            search_matches: matches.as_ref().map(|(_, matches)| matches.as_ref()),
            render: &self.engine.config().render,
            dim_factor: self.engine.config().interaction.dim_factor,
            time: self.time,
        };
        let stats = self.backend.draw(&painter, &frame);
        self.visible_node_count = stats.visible_nodes;
        self.visible_edge_count = stats.visible_edges;

        let settling = self.live_physics && self.engine.mode() == SimulationMode::Running;
        if moving
            || settling
            || self.pointer_captured
            || highlight.is_active()
            || self.backend.is_animating()
        {
            ui.ctx().request_repaint();
        }
    }
}
