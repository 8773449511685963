use std::collections::{HashMap, HashSet};

use serde::Serialize;

pub type NodeId = String;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    /// Explicitly fixed in place by the data source or the user.
    pub pinned: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "type")]
    pub kind: String,
    pub weight: f32,
}

impl Edge {
    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }

    pub fn touches(&self, id: &str) -> bool {
        self.source == id || self.target == id
    }
}

/// Lookup tables derived from the node and link lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GraphIndex {
    pub index_by_id: HashMap<NodeId, usize>,
    /// Distinct undirected neighbours per node, sorted, self excluded.
    pub neighbors: Vec<Vec<usize>>,
    /// Number of distinct neighbours per node.
    pub degree: Vec<usize>,
    /// Endpoint indices per link, parallel to `Graph::links`.
    pub link_endpoints: Vec<(usize, usize)>,
}

/// A validated graph. Links only reference node ids that exist, and the
/// index always matches the node and link lists because both are fixed at
/// construction; a refresh builds a new `Graph` instead of patching one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Node>,
    links: Vec<Edge>,
    index: GraphIndex,
}

impl Graph {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Callers must have already validated that every link endpoint exists
    /// and node ids are unique; `sanitize` is the public way in.
    pub(crate) fn from_validated(nodes: Vec<Node>, links: Vec<Edge>) -> Self {
        let index = super::sanitize::build_indices(&nodes, &links);
        Self {
            nodes,
            links,
            index,
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Edge] {
        &self.links
    }

    pub fn index(&self) -> &GraphIndex {
        &self.index
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.index_by_id.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|index| &self.nodes[index])
    }

    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.index
            .neighbors
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn degree(&self, index: usize) -> usize {
        self.index.degree.get(index).copied().unwrap_or(0)
    }

    pub fn max_degree(&self) -> usize {
        self.index.degree.iter().copied().max().unwrap_or(0)
    }

    pub fn link_endpoints(&self, link_index: usize) -> Option<(usize, usize)> {
        self.index.link_endpoints.get(link_index).copied()
    }

    /// Nodes in `keep` (original order preserved) plus links with both
    /// endpoints kept.
    pub fn induced(&self, keep: &HashSet<usize>) -> Self {
        let nodes = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(index, _)| keep.contains(index))
            .map(|(_, node)| node.clone())
            .collect::<Vec<_>>();

        let links = self
            .links
            .iter()
            .zip(&self.index.link_endpoints)
            .filter(|(_, (source, target))| keep.contains(source) && keep.contains(target))
            .map(|(link, _)| link.clone())
            .collect::<Vec<_>>();

        Self::from_validated(nodes, links)
    }

    /// The node and its direct neighbours.
    pub fn ego(&self, center: usize) -> Self {
        let mut keep = self.neighbors(center).iter().copied().collect::<HashSet<_>>();
        keep.insert(center);
        self.induced(&keep)
    }

    /// Returns a copy with the explicit pin flag of `id` replaced.
    pub fn with_pinned(&self, id: &str, pinned: bool) -> Self {
        let mut next = self.clone();
        if let Some(index) = next.index_of(id) {
            next.nodes[index].pinned = pinned;
        }
        next
    }
}
