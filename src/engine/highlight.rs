use std::collections::HashSet;

use crate::graph::Graph;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Emphasis {
    /// Nothing is focused; draw normally.
    Normal,
    Focus,
    Neighbor,
    Dimmed,
}

/// Which nodes and links stand out around the focused node. Rebuilt every
/// frame from the focus id and the neighbour index, never patched in place.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Highlight {
    focus: Option<usize>,
    related_nodes: HashSet<usize>,
    related_edges: HashSet<usize>,
}

impl Highlight {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn compute(graph: &Graph, focus: Option<&str>) -> Self {
        let Some(focus) = focus.and_then(|id| graph.index_of(id)) else {
            return Self::none();
        };

        let mut related_nodes = HashSet::with_capacity(graph.neighbors(focus).len() + 1);
        related_nodes.insert(focus);
        related_nodes.extend(graph.neighbors(focus).iter().copied());

        let related_edges = (0..graph.link_count())
            .filter(|&link_index| {
                graph
                    .link_endpoints(link_index)
                    .is_some_and(|(from, to)| from == focus || to == focus)
            })
            .collect();

        Self {
            focus: Some(focus),
            related_nodes,
            related_edges,
        }
    }

    pub fn focus(&self) -> Option<usize> {
        self.focus
    }

    pub fn is_active(&self) -> bool {
        self.focus.is_some()
    }

    pub fn is_node_emphasized(&self, index: usize) -> bool {
        self.related_nodes.contains(&index)
    }

    pub fn is_edge_emphasized(&self, link_index: usize) -> bool {
        self.related_edges.contains(&link_index)
    }

    pub fn node_emphasis(&self, index: usize) -> Emphasis {
        match self.focus {
            None => Emphasis::Normal,
            Some(focus) if focus == index => Emphasis::Focus,
            Some(_) if self.related_nodes.contains(&index) => Emphasis::Neighbor,
            Some(_) => Emphasis::Dimmed,
        }
    }

    /// Opacity multiplier for a node; `dim_factor` applies to the rest.
    pub fn node_alpha(&self, index: usize, dim_factor: f32) -> f32 {
        match self.node_emphasis(index) {
            Emphasis::Dimmed => dim_factor,
            _ => 1.0,
        }
    }

    pub fn edge_alpha(&self, link_index: usize, dim_factor: f32) -> f32 {
        if !self.is_active() || self.is_edge_emphasized(link_index) {
            1.0
        } else {
            dim_factor
        }
    }

    pub fn related_edges(&self) -> impl Iterator<Item = usize> + '_ {
        self.related_edges.iter().copied()
    }
}
