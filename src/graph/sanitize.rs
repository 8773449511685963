use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::model::{Edge, Graph, GraphIndex, Node};

pub const DEFAULT_NODE_KIND: &str = "entity";
pub const DEFAULT_LINK_KIND: &str = "related";

/// Graph data as delivered by a source, before validation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGraph {
    #[serde(default)]
    pub nodes: Vec<RawNode>,
    #[serde(default, alias = "edges")]
    pub links: Vec<RawLink>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default, rename = "type", alias = "kind", alias = "group")]
    pub kind: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, alias = "fixed")]
    pub pinned: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawLink {
    #[serde(default)]
    pub source: Option<Endpoint>,
    #[serde(default)]
    pub target: Option<Endpoint>,
    #[serde(default, rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(default)]
    pub weight: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl RawId {
    fn to_id(&self) -> Option<String> {
        let id = match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        };
        (!id.is_empty()).then_some(id)
    }
}

/// Link endpoints arrive either as a bare id or as the whole node object a
/// previous layout pass embedded in the link.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Endpoint {
    Id(RawId),
    Embedded { id: RawId },
    Other(Value),
}

impl Endpoint {
    pub fn id(&self) -> Option<String> {
        match self {
            Self::Id(id) | Self::Embedded { id } => id.to_id(),
            Self::Other(_) => None,
        }
    }
}

impl RawLink {
    pub fn new(source: &str, target: &str) -> Self {
        Self {
            source: Some(Endpoint::Id(RawId::Text(source.to_owned()))),
            target: Some(Endpoint::Id(RawId::Text(target.to_owned()))),
            kind: None,
            weight: None,
        }
    }

    fn endpoints(&self) -> (Option<String>, Option<String>) {
        (
            self.source.as_ref().and_then(Endpoint::id),
            self.target.as_ref().and_then(Endpoint::id),
        )
    }
}

impl RawNode {
    pub fn new(id: &str) -> Self {
        Self {
            id: Some(RawId::Text(id.to_owned())),
            ..Self::default()
        }
    }
}

impl RawGraph {
    /// Interprets arbitrary JSON as graph data. Anything that is not an object
    /// with array-valued `nodes`/`links` yields the empty graph.
    pub fn from_value(value: &Value) -> Self {
        let Some(object) = value.as_object() else {
            warn!("graph payload is not a JSON object; using an empty graph");
            return Self::default();
        };

        for key in ["nodes", "links", "edges"] {
            if let Some(field) = object.get(key)
                && !field.is_array()
            {
                warn!(key, "graph payload field is not an array; using an empty graph");
                return Self::default();
            }
        }

        match Self::deserialize(value) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "graph payload has malformed entries; using an empty graph");
                Self::default()
            }
        }
    }
}

impl From<&Graph> for RawGraph {
    fn from(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|node| RawNode {
                id: Some(RawId::Text(node.id.clone())),
                kind: Some(node.kind.clone()),
                label: Some(node.label.clone()),
                pinned: Some(node.pinned),
            })
            .collect();
        let links = graph
            .links()
            .iter()
            .map(|link| RawLink {
                kind: Some(link.kind.clone()),
                weight: Some(link.weight),
                ..RawLink::new(&link.source, &link.target)
            })
            .collect();
        Self { nodes, links }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub missing_endpoints: usize,
    pub duplicate_ids: usize,
    pub self_loops: usize,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.missing_endpoints == 0 && self.duplicate_ids == 0
    }

    pub fn log(&self, context: &str) {
        if self.is_clean() && self.self_loops == 0 {
            debug!(context, "graph integrity check passed");
        } else {
            warn!(
                context,
                missing_endpoints = self.missing_endpoints,
                duplicate_ids = self.duplicate_ids,
                self_loops = self.self_loops,
                "graph integrity check found problems"
            );
        }
    }
}

/// Counts referential problems without fixing anything.
pub fn integrity_check(raw: &RawGraph) -> IntegrityReport {
    let mut report = IntegrityReport::default();
    let mut known = HashSet::new();
    for node in &raw.nodes {
        if let Some(id) = node.id.as_ref().and_then(RawId::to_id)
            && !known.insert(id)
        {
            report.duplicate_ids += 1;
        }
    }

    for link in &raw.links {
        let (source, target) = link.endpoints();
        match (source, target) {
            (Some(source), Some(target)) if known.contains(&source) && known.contains(&target) => {
                if source == target {
                    report.self_loops += 1;
                }
            }
            _ => report.missing_endpoints += 1,
        }
    }

    report
}

/// Builds a validated [`Graph`]: duplicate node ids keep their first
/// occurrence, links with unknown endpoints are dropped, endpoints become
/// plain ids. A node without an id invalidates the whole payload.
pub fn sanitize(raw: &RawGraph) -> Graph {
    let mut node_ids = Vec::with_capacity(raw.nodes.len());
    for (position, node) in raw.nodes.iter().enumerate() {
        let Some(id) = node.id.as_ref().and_then(RawId::to_id) else {
            warn!(position, "node without an id; discarding graph payload");
            return Graph::empty();
        };
        node_ids.push(id);
    }

    let mut seen = HashSet::with_capacity(node_ids.len());
    let mut nodes = Vec::with_capacity(node_ids.len());
    let mut duplicates = 0usize;
    for (raw_node, id) in raw.nodes.iter().zip(node_ids) {
        if !seen.insert(id.clone()) {
            duplicates += 1;
            continue;
        }

        nodes.push(Node {
            label: raw_node.label.clone().unwrap_or_else(|| id.clone()),
            kind: raw_node
                .kind
                .clone()
                .unwrap_or_else(|| DEFAULT_NODE_KIND.to_owned()),
            pinned: raw_node.pinned.unwrap_or(false),
            id,
        });
    }

    let mut links = Vec::with_capacity(raw.links.len());
    let mut dropped = 0usize;
    let mut self_loops = 0usize;
    for raw_link in &raw.links {
        let (Some(source), Some(target)) = raw_link.endpoints() else {
            dropped += 1;
            continue;
        };
        if !seen.contains(&source) || !seen.contains(&target) {
            debug!(%source, %target, "dropping link with unknown endpoint");
            dropped += 1;
            continue;
        }

        let weight = raw_link
            .weight
            .filter(|weight| weight.is_finite() && *weight > 0.0)
            .unwrap_or(1.0);
        let edge = Edge {
            source,
            target,
            kind: raw_link
                .kind
                .clone()
                .unwrap_or_else(|| DEFAULT_LINK_KIND.to_owned()),
            weight,
        };
        if edge.is_self_loop() {
            self_loops += 1;
        }
        links.push(edge);
    }

    if duplicates > 0 || dropped > 0 {
        warn!(duplicates, dropped, "sanitized graph payload");
    }
    if self_loops > 0 {
        debug!(self_loops, "graph contains self-loops");
    }

    Graph::from_validated(nodes, links)
}

/// Pure index construction. Links whose endpoints are unknown are left out
/// of the neighbour lists and the endpoint table.
pub fn build_indices(nodes: &[Node], links: &[Edge]) -> GraphIndex {
    let index_by_id = nodes
        .iter()
        .enumerate()
        .map(|(index, node)| (node.id.clone(), index))
        .collect::<HashMap<_, _>>();

    let mut neighbor_sets = vec![BTreeSet::new(); nodes.len()];
    let mut link_endpoints = Vec::with_capacity(links.len());
    for link in links {
        let (Some(&source), Some(&target)) = (
            index_by_id.get(&link.source),
            index_by_id.get(&link.target),
        ) else {
            continue;
        };

        link_endpoints.push((source, target));
        if source != target {
            neighbor_sets[source].insert(target);
            neighbor_sets[target].insert(source);
        }
    }

    let neighbors = neighbor_sets
        .into_iter()
        .map(|set| set.into_iter().collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let degree = neighbors.iter().map(Vec::len).collect();

    GraphIndex {
        index_by_id,
        neighbors,
        degree,
        link_endpoints,
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn raw_from_json(value: Value) -> RawGraph {
        RawGraph::from_value(&value)
    }

    #[test]
    fn drops_link_with_missing_endpoint() {
        let raw = raw_from_json(json!({
            "nodes": [{ "id": "a" }, { "id": "b" }, { "id": "c" }],
            "links": [{ "source": "a", "target": "b" }, { "source": "b", "target": "x" }]
        }));

        let graph = sanitize(&raw);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.link_count(), 1);
        assert_eq!(integrity_check(&raw).missing_endpoints, 1);
        assert!(integrity_check(&RawGraph::from(&graph)).is_clean());
    }

    #[test]
    fn embedded_endpoints_are_normalized_to_ids() {
        let raw = raw_from_json(json!({
            "nodes": [{ "id": "a", "type": "component" }, { "id": 7 }],
            "links": [{ "source": { "id": "a", "x": 12.5, "vx": 0.1 }, "target": 7, "type": "supplied_by", "weight": 2.0 }]
        }));

        let graph = sanitize(&raw);
        let link = &graph.links()[0];
        assert_eq!(link.source, "a");
        assert_eq!(link.target, "7");
        assert_eq!(link.kind, "supplied_by");
        assert_eq!(link.weight, 2.0);
        assert_eq!(graph.node("a").map(|node| node.kind.as_str()), Some("component"));
        assert_eq!(graph.node("7").map(|node| node.label.as_str()), Some("7"));
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let raw = raw_from_json(json!({
            "nodes": [{ "id": "a", "label": "first" }, { "id": "b" }, { "id": "a", "label": "second" }],
            "links": []
        }));

        assert_eq!(integrity_check(&raw).duplicate_ids, 1);
        let graph = sanitize(&raw);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node("a").map(|node| node.label.as_str()), Some("first"));
        assert_eq!(graph.nodes()[1].id, "b");
    }

    #[test]
    fn self_loops_are_kept_and_reported() {
        let raw = raw_from_json(json!({
            "nodes": [{ "id": "a" }, { "id": "b" }],
            "links": [{ "source": "a", "target": "a" }, { "source": "a", "target": "b" }]
        }));

        let graph = sanitize(&raw);
        assert_eq!(graph.link_count(), 2);
        assert_eq!(integrity_check(&raw).self_loops, 1);
        assert!(graph.links()[0].is_self_loop());
        assert!(!graph.links()[1].is_self_loop());
        assert_eq!(graph.neighbors(0), &[1]);
        assert_eq!(graph.degree(0), 1);
    }

    #[test]
    fn malformed_payloads_become_empty_graphs() {
        for payload in [
            json!([1, 2, 3]),
            json!({ "nodes": "a,b", "links": [] }),
            json!({ "nodes": [{ "id": "a" }], "links": { "source": "a" } }),
            json!({ "nodes": [{ "label": "no id" }, { "id": "b" }], "links": [] }),
            json!({ "nodes": [{ "id": "a", "label": 42 }] }),
        ] {
            let graph = sanitize(&raw_from_json(payload.clone()));
            assert!(graph.is_empty(), "payload {payload} should sanitize to empty");
            assert_eq!(graph.link_count(), 0);
        }
    }

    #[test]
    fn invalid_weights_default_to_one() {
        let mut raw = RawGraph {
            nodes: vec![RawNode::new("a"), RawNode::new("b")],
            links: vec![RawLink::new("a", "b"), RawLink::new("b", "a")],
        };
        raw.links[0].weight = Some(f32::NAN);
        raw.links[1].weight = Some(-3.0);

        let graph = sanitize(&raw);
        assert!(graph.links().iter().all(|link| link.weight == 1.0));
    }

    #[test]
    fn sanitize_leaves_input_untouched() {
        let raw = RawGraph {
            nodes: vec![RawNode::new("a")],
            links: vec![RawLink::new("a", "ghost")],
        };
        let before = raw.clone();
        let _ = sanitize(&raw);
        assert_eq!(raw, before);
    }

    fn endpoint_strategy() -> impl Strategy<Value = Option<Endpoint>> {
        prop_oneof![
            "[a-h]".prop_map(|id| Some(Endpoint::Id(RawId::Text(id)))),
            "[a-h]".prop_map(|id| Some(Endpoint::Embedded { id: RawId::Text(id) })),
            Just(None),
            Just(Some(Endpoint::Other(Value::Bool(true)))),
        ]
    }

    fn raw_graph_strategy() -> impl Strategy<Value = RawGraph> {
        let nodes = proptest::collection::vec(
            ("[a-f]", proptest::option::of("[A-Z]{1,4}"), any::<bool>()).prop_map(
                |(id, label, pinned)| RawNode {
                    id: Some(RawId::Text(id)),
                    kind: None,
                    label,
                    pinned: Some(pinned),
                },
            ),
            0..10,
        );
        let links = proptest::collection::vec(
            (
                endpoint_strategy(),
                endpoint_strategy(),
                proptest::option::of(prop_oneof![Just(f32::NAN), -2.0f32..5.0]),
            )
                .prop_map(|(source, target, weight)| RawLink {
                    source,
                    target,
                    kind: None,
                    weight,
                }),
            0..16,
        );
        (nodes, links).prop_map(|(nodes, links)| RawGraph { nodes, links })
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(raw in raw_graph_strategy()) {
            let once = sanitize(&raw);
            let twice = sanitize(&RawGraph::from(&once));
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn sanitized_links_reference_existing_nodes(raw in raw_graph_strategy()) {
            let graph = sanitize(&raw);
            for link in graph.links() {
                prop_assert!(graph.node(&link.source).is_some());
                prop_assert!(graph.node(&link.target).is_some());
            }
            prop_assert_eq!(graph.index().link_endpoints.len(), graph.link_count());
            let report = integrity_check(&RawGraph::from(&graph));
            prop_assert!(report.is_clean());
        }
    }
}
