//! Where graphs come from, and what happens when that fails.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use super::model::Graph;
use super::sanitize::{IntegrityReport, RawGraph, integrity_check, sanitize};
use super::synthetic;

/// Anything able to answer a graph query. Implementations may block; the
/// viewer calls them off the frame loop.
pub trait GraphSource: Send + Sync {
    fn describe(&self) -> String;
    fn fetch(&self, topic: Option<&str>) -> Result<RawGraph>;
}

/// Reads a `{nodes, links}` JSON document exported by the query service.
#[derive(Clone, Debug)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GraphSource for FileSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self, _topic: Option<&str>) -> Result<RawGraph> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read graph file {}", self.path.display()))?;
        let value: Value = serde_json::from_str(&raw)
            .with_context(|| format!("graph file {} is not valid JSON", self.path.display()))?;
        Ok(RawGraph::from_value(&value))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FallbackSpec {
    pub seed: u64,
    pub node_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GraphOrigin {
    Source(String),
    /// The source failed and the synthetic graph stands in.
    Fallback { source: String, reason: String },
    /// No source was configured.
    Synthetic,
}

#[derive(Clone, Debug)]
pub struct LoadedGraph {
    pub graph: Graph,
    /// Problems found in the payload before sanitizing.
    pub report: IntegrityReport,
    pub origin: GraphOrigin,
}

/// Fetches, validates and topic-filters a graph. Never fails: a broken source
/// is replaced by the synthetic graph so there is always something to draw.
pub fn load_graph(
    source: Option<&dyn GraphSource>,
    topic: Option<&str>,
    fallback: FallbackSpec,
) -> LoadedGraph {
    let (graph, report, origin) = match source {
        Some(source) => match source.fetch(topic) {
            Ok(raw) => {
                let report = integrity_check(&raw);
                report.log(&source.describe());
                (sanitize(&raw), report, GraphOrigin::Source(source.describe()))
            }
            Err(error) => {
                warn!(source = %source.describe(), error = %format!("{error:#}"), "graph source failed; using synthetic graph");
                (
                    synthetic::generate(fallback.seed, fallback.node_count),
                    IntegrityReport::default(),
                    GraphOrigin::Fallback {
                        source: source.describe(),
                        reason: format!("{error:#}"),
                    },
                )
            }
        },
        None => (
            synthetic::generate(fallback.seed, fallback.node_count),
            IntegrityReport::default(),
            GraphOrigin::Synthetic,
        ),
    };

    let graph = match topic.map(str::trim).filter(|topic| !topic.is_empty()) {
        Some(topic) => focus_topic(&graph, topic),
        None => graph,
    };

    info!(
        nodes = graph.node_count(),
        links = graph.link_count(),
        "graph loaded"
    );

    LoadedGraph {
        graph,
        report,
        origin,
    }
}

/// Narrows the graph to the node matching `topic` and its neighbours. Exact
/// id matches win over label matches; no match keeps the whole graph.
pub fn focus_topic(graph: &Graph, topic: &str) -> Graph {
    let needle = topic.to_lowercase();
    let center = graph
        .nodes()
        .iter()
        .position(|node| node.id.eq_ignore_ascii_case(topic))
        .or_else(|| {
            graph
                .nodes()
                .iter()
                .position(|node| node.label.to_lowercase().contains(&needle))
        });

    match center {
        Some(center) => graph.ego(center),
        None => {
            warn!(topic, "no node matches topic; showing the full graph");
            graph.clone()
        }
    }
}

/// A node the inference service considered relevant to an answer.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RelatedNode {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResult {
    #[serde(default)]
    pub answer: String,
    #[serde(default, alias = "related_nodes")]
    pub related_nodes: Vec<RelatedNode>,
}

pub fn load_inference_result(path: &Path) -> Result<InferenceResult> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read inference result {}", path.display()))?;
    let result: InferenceResult = serde_json::from_str(&raw)
        .with_context(|| format!("invalid inference result in {}", path.display()))?;
    if result.related_nodes.is_empty() {
        return Err(anyhow!(
            "inference result {} lists no related nodes",
            path.display()
        ));
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serde_json::json;

    use super::*;

    struct BrokenSource;

    impl GraphSource for BrokenSource {
        fn describe(&self) -> String {
            "broken".to_owned()
        }

        fn fetch(&self, _topic: Option<&str>) -> Result<RawGraph> {
            Err(anyhow!("connection refused"))
        }
    }

    const FALLBACK: FallbackSpec = FallbackSpec {
        seed: 11,
        node_count: 40,
    };

    #[test]
    fn failing_source_falls_back_to_synthetic_graph() {
        let loaded = load_graph(Some(&BrokenSource), None, FALLBACK);
        assert_eq!(loaded.graph.node_count(), 40);
        match loaded.origin {
            GraphOrigin::Fallback { source, reason } => {
                assert_eq!(source, "broken");
                assert!(reason.contains("connection refused"));
            }
            other => panic!("unexpected origin {other:?}"),
        }
    }

    #[test]
    fn file_source_reads_and_reports_integrity() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let payload = json!({
            "nodes": [{ "id": "a" }, { "id": "b" }, { "id": "c" }],
            "links": [{ "source": "a", "target": "b" }, { "source": "b", "target": "x" }]
        });
        write!(file, "{payload}").unwrap();

        let source = FileSource::new(file.path());
        let loaded = load_graph(Some(&source), None, FALLBACK);
        assert_eq!(loaded.graph.node_count(), 3);
        assert_eq!(loaded.graph.link_count(), 1);
        assert_eq!(loaded.report.missing_endpoints, 1);
        assert!(matches!(loaded.origin, GraphOrigin::Source(_)));
    }

    #[test]
    fn unreadable_file_is_a_fallback_not_an_error() {
        let source = FileSource::new("/definitely/not/here.json");
        let loaded = load_graph(Some(&source), None, FALLBACK);
        assert!(matches!(loaded.origin, GraphOrigin::Fallback { .. }));
        assert!(!loaded.graph.is_empty());
    }

    #[test]
    fn topic_narrows_to_ego_graph() {
        let graph = sanitize(&RawGraph::from_value(&json!({
            "nodes": [
                { "id": "PN-1", "label": "Quad op-amp" },
                { "id": "MFR-1" },
                { "id": "ASM-1" },
                { "id": "far" }
            ],
            "links": [
                { "source": "ASM-1", "target": "PN-1" },
                { "source": "PN-1", "target": "MFR-1" },
                { "source": "MFR-1", "target": "far" }
            ]
        })));

        let by_label = focus_topic(&graph, "op-amp");
        assert_eq!(by_label.node_count(), 3);
        assert!(by_label.node("far").is_none());

        let by_id = focus_topic(&graph, "mfr-1");
        assert!(by_id.node("far").is_some());
        assert!(by_id.node("ASM-1").is_none());

        assert_eq!(focus_topic(&graph, "nothing like it"), graph);
    }

    #[test]
    fn inference_result_accepts_camel_case_related_nodes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "answer": "PN-1 is end of life", "relatedNodes": [{{ "id": "PN-1", "label": "Quad op-amp" }}] }}"#
        )
        .unwrap();

        let result = load_inference_result(file.path()).unwrap();
        assert_eq!(result.related_nodes.len(), 1);
        assert_eq!(result.related_nodes[0].id, "PN-1");
    }
}
