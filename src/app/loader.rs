//! Background graph loading. Each load runs on its own thread and reports
//! back over a channel that the frame loop polls; a newer load or teardown
//! cancels the older one and its result is dropped.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use dmsms_graph::config::EngineConfig;
use dmsms_graph::engine::PreparedGraph;
use dmsms_graph::engine::physics::Dimension;
use dmsms_graph::graph::source::{FallbackSpec, FileSource, GraphOrigin, GraphSource, load_graph};
use dmsms_graph::graph::IntegrityReport;

#[derive(Clone, Debug, Default)]
pub(super) struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub(super) fn new() -> Self {
        Self::default()
    }

    pub(super) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub(super) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Debug)]
pub(super) struct LoadRequest {
    pub(super) graph_path: Option<PathBuf>,
    pub(super) topic: Option<String>,
    pub(super) fallback: FallbackSpec,
    pub(super) config: EngineConfig,
    pub(super) dimension: Dimension,
}

pub(super) struct LoadOutcome {
    pub(super) generation: u64,
    pub(super) prepared: PreparedGraph,
    pub(super) report: IntegrityReport,
    pub(super) origin: GraphOrigin,
    pub(super) elapsed: Duration,
}

pub(super) enum LoadPoll {
    Idle,
    Pending,
    Ready(Box<LoadOutcome>),
    /// The worker went away without answering.
    Lost,
}

struct PendingLoad {
    generation: u64,
    token: CancellationToken,
    rx: Receiver<LoadOutcome>,
}

#[derive(Default)]
pub(super) struct GraphLoader {
    generation: u64,
    pending: Option<PendingLoad>,
}

impl GraphLoader {
    pub(super) fn new() -> Self {
        Self::default()
    }

    /// Starts a load, superseding any load still in flight.
    pub(super) fn start(&mut self, request: LoadRequest) -> u64 {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel();

        let worker_token = token.clone();
        thread::spawn(move || {
            if let Some(outcome) = run_load(generation, request, &worker_token) {
                let _ = tx.send(outcome);
            }
        });

        debug!(generation, "graph load started");
        self.pending = Some(PendingLoad {
            generation,
            token,
            rx,
        });
        generation
    }

    pub(super) fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub(super) fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn poll(&mut self) -> LoadPoll {
        let Some(pending) = self.pending.take() else {
            return LoadPoll::Idle;
        };

        match pending.rx.try_recv() {
            Ok(outcome) if outcome.generation == pending.generation && !pending.token.is_cancelled() => {
                LoadPoll::Ready(Box::new(outcome))
            }
            Ok(outcome) => {
                debug!(generation = outcome.generation, "dropping stale graph load");
                LoadPoll::Idle
            }
            Err(TryRecvError::Empty) => {
                self.pending = Some(pending);
                LoadPoll::Pending
            }
            Err(TryRecvError::Disconnected) => LoadPoll::Lost,
        }
    }

    pub(super) fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.token.cancel();
            debug!(generation = pending.generation, "graph load cancelled");
        }
    }
}

impl Drop for GraphLoader {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn run_load(generation: u64, request: LoadRequest, token: &CancellationToken) -> Option<LoadOutcome> {
    let started = Instant::now();
    let source = request.graph_path.map(FileSource::new);
    let loaded = load_graph(
        source.as_ref().map(|source| source as &dyn GraphSource),
        request.topic.as_deref(),
        request.fallback,
    );
    if token.is_cancelled() {
        return None;
    }

    let prepared = PreparedGraph::new(loaded.graph, &request.config, request.dimension);
    if token.is_cancelled() {
        return None;
    }

    let elapsed = started.elapsed();
    info!(
        generation,
        elapsed_ms = elapsed.as_millis() as u64,
        "graph load finished"
    );
    Some(LoadOutcome {
        generation,
        prepared,
        report: loaded.report,
        origin: loaded.origin,
        elapsed,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn request(graph_path: Option<PathBuf>) -> LoadRequest {
        LoadRequest {
            graph_path,
            topic: None,
            fallback: FallbackSpec {
                seed: 7,
                node_count: 40,
            },
            config: EngineConfig::default(),
            dimension: Dimension::Two,
        }
    }

    fn wait(loader: &mut GraphLoader) -> LoadPoll {
        for _ in 0..500 {
            match loader.poll() {
                LoadPoll::Pending => thread::sleep(Duration::from_millis(10)),
                other => return other,
            }
        }
        LoadPoll::Pending
    }

    #[test]
    fn synthetic_load_completes() {
        let mut loader = GraphLoader::new();
        let generation = loader.start(request(None));
        let LoadPoll::Ready(outcome) = wait(&mut loader) else {
            panic!("load did not complete");
        };
        assert_eq!(outcome.generation, generation);
        assert_eq!(outcome.origin, GraphOrigin::Synthetic);
        assert_eq!(outcome.prepared.full.node_count(), 40);
        assert!(!loader.is_loading());
    }

    #[test]
    fn file_load_reports_integrity_problems() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"nodes":[{{"id":"a"}},{{"id":"b"}}],"links":[{{"source":"a","target":"b"}},{{"source":"a","target":"ghost"}}]}}"#
        )
        .unwrap();

        let mut loader = GraphLoader::new();
        loader.start(request(Some(file.path().to_path_buf())));
        let LoadPoll::Ready(outcome) = wait(&mut loader) else {
            panic!("load did not complete");
        };
        assert_eq!(outcome.report.missing_endpoints, 1);
        assert_eq!(outcome.prepared.full.link_count(), 1);
        assert!(matches!(outcome.origin, GraphOrigin::Source(_)));
    }

    #[test]
    fn a_newer_load_supersedes_the_older_one() {
        let mut loader = GraphLoader::new();
        let first = loader.start(request(None));
        let second = loader.start(request(None));
        assert!(second > first);
        let LoadPoll::Ready(outcome) = wait(&mut loader) else {
            panic!("load did not complete");
        };
        assert_eq!(outcome.generation, second);
    }

    #[test]
    fn cancelled_loads_never_deliver() {
        let mut loader = GraphLoader::new();
        loader.start(request(None));
        loader.cancel();
        assert!(!loader.is_loading());
        assert!(matches!(loader.poll(), LoadPoll::Idle));
    }

    #[test]
    fn tokens_share_cancellation() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
