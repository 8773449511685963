use std::collections::{HashSet, VecDeque};

use tracing::debug;

use super::model::Graph;

/// Bounds `graph` to at most `max_nodes` nodes while keeping the kept part as
/// connected as possible: breadth-first from the highest-degree node, then
/// topped up by descending degree if that component runs out.
pub fn select_connected_subset(graph: &Graph, max_nodes: usize) -> Graph {
    if graph.node_count() <= max_nodes {
        return graph.clone();
    }
    if max_nodes == 0 {
        return Graph::empty();
    }

    let Some(seed) = highest_degree_node(graph) else {
        return Graph::empty();
    };

    let mut selected = HashSet::with_capacity(max_nodes);
    let mut queue = VecDeque::from([seed]);
    selected.insert(seed);

    'bfs: while let Some(current) = queue.pop_front() {
        for &next in graph.neighbors(current) {
            if selected.len() >= max_nodes {
                break 'bfs;
            }
            if selected.insert(next) {
                queue.push_back(next);
            }
        }
    }

    let component_size = selected.len();
    if selected.len() < max_nodes {
        let mut remaining = (0..graph.node_count())
            .filter(|index| !selected.contains(index))
            .collect::<Vec<_>>();
        // Stable sort keeps first-encountered order among equal degrees.
        remaining.sort_by(|a, b| graph.degree(*b).cmp(&graph.degree(*a)));
        for index in remaining {
            if selected.len() >= max_nodes {
                break;
            }
            selected.insert(index);
        }
    }

    debug!(
        seed = %graph.nodes()[seed].id,
        component_size,
        selected = selected.len(),
        total = graph.node_count(),
        "selected connected subset"
    );

    graph.induced(&selected)
}

fn highest_degree_node(graph: &Graph) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for index in 0..graph.node_count() {
        let degree = graph.degree(index);
        if best.is_none_or(|(_, best_degree)| degree > best_degree) {
            best = Some((index, degree));
        }
    }
    best.map(|(index, _)| index)
}
