use chrono::{DateTime, Utc};
use serde::Serialize;

use super::model::{Edge, Graph, Node};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportMetadata {
    pub node_count: usize,
    pub link_count: usize,
    pub generated_at: DateTime<Utc>,
}

/// Plain `{nodes, links, metadata}` snapshot of a graph.
#[derive(Clone, Debug, Serialize)]
pub struct GraphExport<'a> {
    pub nodes: &'a [Node],
    pub links: &'a [Edge],
    pub metadata: ExportMetadata,
}

pub fn export_graph(graph: &Graph, generated_at: DateTime<Utc>) -> GraphExport<'_> {
    GraphExport {
        nodes: graph.nodes(),
        links: graph.links(),
        metadata: ExportMetadata {
            node_count: graph.node_count(),
            link_count: graph.link_count(),
            generated_at,
        },
    }
}

pub fn export_json(graph: &Graph, generated_at: DateTime<Utc>) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&export_graph(graph, generated_at))
}
