use std::collections::VecDeque;

use eframe::egui::{self, Align, Context, Layout};
use tracing::warn;

use dmsms_graph::config::EngineConfig;
use dmsms_graph::engine::physics::Dimension;
use dmsms_graph::engine::{Engine, ScreenSpace};
use dmsms_graph::graph::source::GraphOrigin;

use super::super::loader::LoadOutcome;
use super::super::notices::Notices;
use super::super::render::make_backend;
use super::super::{FrameRequests, ViewModel};

impl ViewModel {
    pub(in crate::app) const INITIAL_NEIGHBOR_ROWS: usize = 24;
    pub(in crate::app) const NEIGHBOR_PAGE_ROWS: usize = 24;
    pub(in crate::app) const NEIGHBOR_PREFETCH_MARGIN: usize = 4;

    pub(in crate::app) fn new(outcome: LoadOutcome, config: EngineConfig, notices: &mut Notices) -> Self {
        let (backend, error) = make_backend(outcome.prepared.dimension, &config.camera);
        if let Some(error) = error {
            warn!(%error, "3D view unavailable; using 2D");
            notices.warning(format!("3D view unavailable ({error}); showing 2D."));
        }

        let mut engine = Engine::new(config, backend.kind());
        engine.install(outcome.prepared);
        engine.set_dimension(backend.kind());

        Self {
            engine,
            backend,
            screen: ScreenSpace::default(),
            origin: outcome.origin,
            report: outcome.report,
            load_elapsed: outcome.elapsed,
            graph_revision: 0,
            search: String::new(),
            search_match_cache: None,
            live_physics: true,
            time: 0.0,
            camera_reset_requested: false,
            pointer_captured: false,
            neighbor_rows_visible: Self::INITIAL_NEIGHBOR_ROWS,
            show_fps_bar: true,
            fps_current: 0.0,
            fps_samples: VecDeque::new(),
            visible_node_count: 0,
            visible_edge_count: 0,
        }
    }

    /// Swaps in a reloaded graph. The camera stays where the user left it.
    pub(in crate::app) fn install(&mut self, outcome: LoadOutcome) {
        self.engine.install(outcome.prepared);
        self.engine.set_dimension(self.backend.kind());
        self.origin = outcome.origin;
        self.report = outcome.report;
        self.load_elapsed = outcome.elapsed;
        self.graph_changed();
    }

    pub(in crate::app) fn graph_changed(&mut self) {
        self.graph_revision += 1;
        self.search_match_cache = None;
        self.screen = ScreenSpace::default();
        self.neighbor_rows_visible = Self::INITIAL_NEIGHBOR_ROWS;
    }

    /// Switches between the flat and perspective views. A perspective camera
    /// that cannot be built leaves the view in 2D.
    pub(in crate::app) fn switch_dimension(&mut self, dimension: Dimension, notices: &mut Notices) {
        if dimension == self.backend.kind() {
            return;
        }
        let (backend, error) = make_backend(dimension, &self.engine.config().camera);
        if let Some(error) = error {
            warn!(%error, "3D view unavailable; staying in 2D");
            notices.warning(format!("3D view unavailable ({error}); showing 2D."));
        }
        self.backend = backend;
        self.engine.set_dimension(self.backend.kind());
        self.screen = ScreenSpace::default();
    }

    pub(in crate::app) fn show(
        &mut self,
        ctx: &Context,
        notices: &mut Notices,
        requests: &mut FrameRequests,
        is_loading: bool,
    ) {
        self.update_fps_counter(ctx);

        egui::TopBottomPanel::top("top_bar")
            .resizable(false)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("DMSMS graph");
                    ui.separator();
                    ui.label(self.origin_text());
                    ui.label(format!(
                        "nodes: {} of {}",
                        self.engine.graph().node_count(),
                        self.engine.full_graph().node_count()
                    ));
                    ui.label(format!("links: {}", self.engine.graph().link_count()));
                    let reload_button = ui.add_enabled(!is_loading, egui::Button::new("Reload"));
                    if reload_button.clicked() {
                        requests.reload = true;
                    }
                    if is_loading {
                        ui.spinner();
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        ui.label(self.visible_graph_text());
                        if let Some(fps_text) = self.fps_display_text() {
                            ui.label(fps_text);
                        }
                    });
                });
            });

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.draw_controls(ui, notices, requests));
            });

        egui::SidePanel::right("details")
            .resizable(true)
            .default_width(320.0)
            .show(ctx, |ui| self.draw_details(ui));

        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| self.draw_graph(ui, notices));
    }

    fn origin_text(&self) -> String {
        match &self.origin {
            GraphOrigin::Source(source) => format!("source: {source}"),
            GraphOrigin::Fallback { source, .. } => format!("source: {source} (unavailable, synthetic)"),
            GraphOrigin::Synthetic => "source: synthetic".to_owned(),
        }
    }
}
