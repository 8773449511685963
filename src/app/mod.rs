use std::collections::{HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use eframe::egui::{self, Context};
use tracing::{info, warn};

use dmsms_graph::config::EngineConfig;
use dmsms_graph::engine::physics::Dimension;
use dmsms_graph::engine::{Engine, ScreenSpace};
use dmsms_graph::graph::IntegrityReport;
use dmsms_graph::graph::source::{FallbackSpec, GraphOrigin, RelatedNode};

use loader::{GraphLoader, LoadOutcome, LoadPoll, LoadRequest};
use notices::Notices;
use render::RenderBackend;

mod graph;
mod loader;
mod notices;
mod render;
mod render_utils;
mod ui;

/// Everything the command line decides before the window opens.
pub struct LaunchOptions {
    pub graph_path: Option<PathBuf>,
    pub topic: Option<String>,
    pub related: Vec<RelatedNode>,
    pub fallback: FallbackSpec,
    pub dimension: Dimension,
    pub config: EngineConfig,
}

pub struct DmsmsGraphApp {
    options: LaunchOptions,
    loader: GraphLoader,
    notices: Notices,
    state: AppState,
    /// Applied once, after the first graph arrives.
    pending_related: Option<Vec<RelatedNode>>,
}

enum AppState {
    Loading,
    Ready(Box<ViewModel>),
}

struct ViewModel {
    engine: Engine,
    backend: Box<dyn RenderBackend>,
    screen: ScreenSpace,
    origin: GraphOrigin,
    report: IntegrityReport,
    load_elapsed: Duration,
    graph_revision: u64,
    search: String,
    search_match_cache: Option<SearchMatchCache>,
    live_physics: bool,
    time: f32,
    camera_reset_requested: bool,
    /// A primary press started on the canvas and has not been released.
    pointer_captured: bool,
    neighbor_rows_visible: usize,
    show_fps_bar: bool,
    fps_current: f32,
    fps_samples: VecDeque<f32>,
    visible_node_count: usize,
    visible_edge_count: usize,
}

struct SearchMatchCache {
    query: String,
    graph_revision: u64,
    /// Working-graph indices, best match first.
    ranked: Arc<Vec<usize>>,
    matches: Arc<HashSet<usize>>,
}

/// What the panels ask the app to do after this frame.
#[derive(Clone, Copy, Debug, Default)]
struct FrameRequests {
    reload: bool,
}

impl DmsmsGraphApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, options: LaunchOptions) -> Self {
        let pending_related = (!options.related.is_empty()).then(|| options.related.clone());
        let mut app = Self {
            options,
            loader: GraphLoader::new(),
            notices: Notices::new(),
            state: AppState::Loading,
            pending_related,
        };
        app.start_load(app.options.dimension, app.options.config.clone());
        app
    }

    fn start_load(&mut self, dimension: Dimension, config: EngineConfig) {
        self.loader.start(LoadRequest {
            graph_path: self.options.graph_path.clone(),
            topic: self.options.topic.clone(),
            fallback: self.options.fallback,
            config,
            dimension,
        });
    }

    fn reload(&mut self) {
        let (dimension, config) = match &self.state {
            AppState::Ready(model) => (model.engine.dimension(), model.engine.config().clone()),
            AppState::Loading => (self.options.dimension, self.options.config.clone()),
        };
        info!("reloading graph");
        self.start_load(dimension, config);
    }

    fn finish_load(&mut self, outcome: LoadOutcome) {
        announce_origin(&mut self.notices, &outcome.origin);
        if outcome.prepared.full.is_empty() {
            self.notices.info("The graph source returned no nodes.");
        }
        if !outcome.report.is_clean() {
            self.notices.warning(format!(
                "Dropped {} links with unknown endpoints and {} duplicate nodes.",
                outcome.report.missing_endpoints, outcome.report.duplicate_ids
            ));
        }

        match &mut self.state {
            AppState::Ready(model) => model.install(outcome),
            AppState::Loading => {
                let model = ViewModel::new(outcome, self.options.config.clone(), &mut self.notices);
                self.state = AppState::Ready(Box::new(model));
            }
        }

        if let AppState::Ready(model) = &mut self.state
            && let Some(related) = self.pending_related.take()
        {
            match model.engine.focus_related(&related) {
                Some(id) => self.notices.info(format!("Focused {id} from the inference result.")),
                None => self
                    .notices
                    .warning("None of the related nodes are in the current graph."),
            }
        }
    }
}

fn announce_origin(notices: &mut Notices, origin: &GraphOrigin) {
    match origin {
        GraphOrigin::Source(_) => {}
        GraphOrigin::Synthetic => notices.info("No graph source configured; showing a synthetic graph."),
        GraphOrigin::Fallback { source, reason } => {
            warn!(source, reason, "showing synthetic graph");
            notices.warning(format!("Could not load {source}; showing a synthetic graph."));
        }
    }
}

impl eframe::App for DmsmsGraphApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        match self.loader.poll() {
            LoadPoll::Ready(outcome) => self.finish_load(*outcome),
            LoadPoll::Lost => {
                warn!("graph loader exited without a result");
                self.notices.error("The graph loader stopped unexpectedly.");
            }
            LoadPoll::Pending => ctx.request_repaint_after(Duration::from_millis(50)),
            LoadPoll::Idle => {}
        }

        let mut requests = FrameRequests::default();
        let is_loading = self.loader.is_loading();
        match &mut self.state {
            AppState::Loading => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Loading DMSMS graph...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
            }
            AppState::Ready(model) => {
                model.show(ctx, &mut self.notices, &mut requests, is_loading);
            }
        }

        if requests.reload && !is_loading {
            self.reload();
        }

        self.notices.show(ctx);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        self.loader.cancel();
        info!(generation = self.loader.generation(), "viewer closed");
    }
}
