//! One engine instance per mounted view: it owns the graph, the simulation,
//! the interaction state and the tunables, and exposes a single tick plus
//! explicit input handlers so it can be driven (and tested) without a window.

mod highlight;
mod interaction;
pub mod physics;

use chrono::{DateTime, Utc};
use glam::Vec3;
use tracing::{debug, info};

use crate::config::{EngineConfig, RenderConfig};
use crate::graph::source::RelatedNode;
use crate::graph::{Graph, NodeId, export, select_connected_subset};
pub use highlight::{Emphasis, Highlight};
pub use interaction::{
    HitTier, InteractionController, InteractionMode, InteractionState, PointerEvent,
    PointerOutcome, Projector, ScreenNode, ScreenSpace, hit_test,
};
use interaction::InteractionContext;
use physics::{Body, Dimension, Simulation, SimulationMode, prelayout};

const PRELAYOUT_ITERATIONS: usize = 90;

/// Radius grows with the square root of degree so hubs stand out without
/// swallowing their neighbours.
pub fn node_radius(degree: usize, max_degree: usize, config: &RenderConfig) -> f32 {
    let ratio = if max_degree == 0 {
        0.0
    } else {
        (degree as f32 / max_degree as f32).clamp(0.0, 1.0)
    };
    let span = (config.max_node_radius - config.min_node_radius).max(0.0);
    config.min_node_radius + span * ratio.sqrt()
}

fn radii_for(graph: &Graph, config: &RenderConfig) -> Vec<f32> {
    let max_degree = graph.max_degree();
    (0..graph.node_count())
        .map(|index| node_radius(graph.degree(index), max_degree, config))
        .collect()
}

/// Everything the engine needs to swap in a new graph, computed without
/// touching a live engine so it can run on a loader thread.
#[derive(Clone, Debug)]
pub struct PreparedGraph {
    pub full: Graph,
    pub working: Graph,
    pub positions: Vec<Vec3>,
    pub dimension: Dimension,
}

impl PreparedGraph {
    pub fn new(full: Graph, config: &EngineConfig, dimension: Dimension) -> Self {
        let working = select_connected_subset(&full, config.subset.max_nodes);
        let radii = radii_for(&working, &config.render);
        let positions = prelayout(&working, &radii, dimension, PRELAYOUT_ITERATIONS);
        debug!(
            full = full.node_count(),
            working = working.node_count(),
            "prepared graph"
        );
        Self {
            full,
            working,
            positions,
            dimension,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    full: Graph,
    graph: Graph,
    simulation: Simulation,
    interaction: InteractionController,
}

impl Engine {
    pub fn new(config: EngineConfig, dimension: Dimension) -> Self {
        let graph = Graph::empty();
        let simulation = Simulation::new(&graph, &[], &[], dimension, &config.physics);
        Self {
            config,
            full: Graph::empty(),
            graph,
            simulation,
            interaction: InteractionController::new(),
        }
    }

    pub fn with_graph(full: Graph, config: EngineConfig, dimension: Dimension) -> Self {
        let prepared = PreparedGraph::new(full, &config, dimension);
        let mut engine = Self::new(config, dimension);
        engine.install(prepared);
        engine
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Live tunables. Physics values are read every tick; changing the
    /// subset budget needs [`Engine::set_max_nodes`].
    pub fn config_mut(&mut self) -> &mut EngineConfig {
        &mut self.config
    }

    pub fn full_graph(&self) -> &Graph {
        &self.full
    }

    /// The bounded working subset that is simulated and drawn.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn bodies(&self) -> &[Body] {
        self.simulation.bodies()
    }

    pub fn position(&self, index: usize) -> Option<Vec3> {
        self.simulation.position(index)
    }

    pub fn node_radius(&self, index: usize) -> f32 {
        self.simulation
            .bodies()
            .get(index)
            .map_or(self.config.render.min_node_radius, |body| body.radius)
    }

    pub fn dimension(&self) -> Dimension {
        self.simulation.dimension()
    }

    pub fn mode(&self) -> SimulationMode {
        self.simulation.mode(&self.config.physics)
    }

    pub fn interaction(&self) -> &InteractionState {
        self.interaction.state()
    }

    /// Swaps in a prepared graph wholesale. Positions come from the prepared
    /// layout; interaction state is cleared.
    pub fn install(&mut self, prepared: PreparedGraph) {
        let radii = radii_for(&prepared.working, &self.config.render);
        self.simulation = Simulation::new(
            &prepared.working,
            &radii,
            &prepared.positions,
            prepared.dimension,
            &self.config.physics,
        );
        self.full = prepared.full;
        self.graph = prepared.working;
        self.interaction.reset();
        info!(
            nodes = self.graph.node_count(),
            links = self.graph.link_count(),
            total = self.full.node_count(),
            "graph installed"
        );
    }

    pub fn replace_graph(&mut self, full: Graph) {
        let prepared = PreparedGraph::new(full, &self.config, self.dimension());
        self.install(prepared);
    }

    /// Re-selects the working subset under a new budget. Nodes that survive
    /// keep their positions; the simulation is reheated.
    pub fn set_max_nodes(&mut self, max_nodes: usize) {
        let max_nodes = max_nodes.max(1);
        if max_nodes == self.config.subset.max_nodes {
            return;
        }
        self.config.subset.max_nodes = max_nodes;

        let working = select_connected_subset(&self.full, max_nodes);
        let kept = self.simulation.has_ticked();
        let positions = working
            .nodes()
            .iter()
            .map(|node| {
                self.graph
                    .index_of(&node.id)
                    .filter(|_| kept)
                    .and_then(|index| self.simulation.bodies().get(index))
                    .map_or(Vec3::NAN, |body| body.position)
            })
            .collect::<Vec<_>>();

        let radii = radii_for(&working, &self.config.render);
        self.simulation = Simulation::new(
            &working,
            &radii,
            &positions,
            self.dimension(),
            &self.config.physics,
        );
        self.graph = working;
        self.interaction.retain(&self.graph);
        debug!(max_nodes, nodes = self.graph.node_count(), "working subset changed");
    }

    pub fn set_dimension(&mut self, dimension: Dimension) {
        self.simulation.set_dimension(dimension, &self.config.physics);
    }

    pub fn reheat(&mut self) {
        self.simulation.reheat(&self.config.physics);
    }

    /// Advances the layout by `dt` seconds. Returns whether anything moved.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.simulation.tick(dt, &self.config.physics)
    }

    pub fn handle_pointer(
        &mut self,
        event: PointerEvent,
        space: &ScreenSpace,
        projector: &dyn Projector,
    ) -> PointerOutcome {
        self.interaction.handle(
            event,
            InteractionContext {
                graph: &self.graph,
                simulation: &mut self.simulation,
                space,
                projector,
                config: &self.config.interaction,
                physics: &self.config.physics,
            },
        )
    }

    pub fn is_dragging_node(&self) -> bool {
        self.interaction.is_dragging_node()
    }

    pub fn highlight(&self) -> Highlight {
        Highlight::compute(&self.graph, self.interaction.state().focus())
    }

    /// Locks `id` if it is in the working graph; `None` clears the lock.
    pub fn lock(&mut self, id: Option<&str>) -> bool {
        match id {
            Some(id) if self.graph.node(id).is_none() => false,
            Some(id) => self.interaction.set_locked(Some(id.to_owned())),
            None => self.interaction.set_locked(None),
        }
    }

    /// Locks the first related node present in the working graph, matching
    /// by id and then by label, ignoring case.
    pub fn focus_related(&mut self, related: &[RelatedNode]) -> Option<NodeId> {
        let found = related.iter().find_map(|candidate| {
            if let Some(node) = self.graph.node(&candidate.id) {
                return Some(node.id.clone());
            }
            let nodes = self.graph.nodes();
            if let Some(node) = nodes
                .iter()
                .find(|node| node.id.eq_ignore_ascii_case(&candidate.id))
            {
                return Some(node.id.clone());
            }
            let label = candidate.label.as_deref()?.to_lowercase();
            nodes
                .iter()
                .find(|node| node.label.to_lowercase() == label)
                .map(|node| node.id.clone())
        });

        match &found {
            Some(id) => {
                self.interaction.set_locked(Some(id.clone()));
                info!(node = %id, "focused related node");
            }
            None => debug!(candidates = related.len(), "no related node in view"),
        }
        found
    }

    /// Flips the explicit fixed flag of a node. Fixed nodes ignore forces
    /// until released. Returns the new flag.
    pub fn toggle_fixed(&mut self, id: &str) -> Option<bool> {
        let index = self.graph.index_of(id)?;
        let pinned = !self.graph.nodes()[index].pinned;
        self.graph = self.graph.with_pinned(id, pinned);
        self.full = self.full.with_pinned(id, pinned);
        self.simulation.set_pinned(index, pinned);
        if !pinned {
            self.reheat();
        }
        Some(pinned)
    }

    pub fn export_json(&self, now: DateTime<Utc>) -> serde_json::Result<String> {
        export::export_json(&self.graph, now)
    }
}
