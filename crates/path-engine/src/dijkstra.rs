use crate::error::{GraphError, Result};
use crate::frontier::Frontier;
use crate::graph::{Graph, NodeIndex};

/// Output of a single-source Dijkstra run.
///
/// Distances and predecessors are indexed by [`NodeIndex`]. The graph the
/// run was computed on is never written to, so any number of these can be
/// computed concurrently against one shared graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ShortestPaths {
    source: NodeIndex,
    distances: Vec<f64>,
    predecessors: Vec<Option<NodeIndex>>,
}

impl ShortestPaths {
    pub fn source(&self) -> NodeIndex {
        self.source
    }

    /// Shortest distance from the source, `f64::INFINITY` when unreached.
    pub fn distance(&self, node: NodeIndex) -> f64 {
        self.distances
            .get(node as usize)
            .copied()
            .unwrap_or(f64::INFINITY)
    }

    /// Previous node on the shortest path. `None` for the source and for
    /// unreached nodes.
    pub fn predecessor(&self, node: NodeIndex) -> Option<NodeIndex> {
        self.predecessors.get(node as usize).copied().flatten()
    }

    pub fn is_reachable(&self, node: NodeIndex) -> bool {
        self.distance(node).is_finite()
    }

    pub fn reachable_count(&self) -> usize {
        self.distances.iter().filter(|d| d.is_finite()).count()
    }

    pub fn num_nodes(&self) -> usize {
        self.distances.len()
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }
}

/// Run Dijkstra from `source` over `graph`.
///
/// Fails only when `source` is not an index of `graph`.
#[tracing::instrument(skip(graph), fields(nodes = graph.num_nodes()))]
pub fn shortest_paths(graph: &Graph, source: NodeIndex) -> Result<ShortestPaths> {
    if graph.node(source).is_none() {
        return Err(GraphError::node_not_found(format!("#{}", source)));
    }

    let n = graph.num_nodes();
    let mut distances = vec![f64::INFINITY; n];
    let mut predecessors: Vec<Option<NodeIndex>> = vec![None; n];
    let mut frontier = Frontier::new(n);

    distances[source as usize] = 0.0;
    frontier.push_or_decrease(source, 0.0);

    let mut settled = 0usize;
    while let Some((u, dist_u)) = frontier.pop_min() {
        settled += 1;

        for edge in graph.edges(u) {
            if frontier.is_finalized(edge.target) {
                continue;
            }
            let v = edge.target as usize;
            let candidate = dist_u + edge.weight;
            // Strict: the first finalized predecessor wins among equal costs.
            if candidate < distances[v] {
                distances[v] = candidate;
                predecessors[v] = Some(u);
                frontier.push_or_decrease(edge.target, candidate);
            }
        }
    }
    debug_assert!(frontier.is_empty());

    tracing::trace!(settled, "dijkstra finished");
    Ok(ShortestPaths {
        source,
        distances,
        predecessors,
    })
}

/// Resolve `source_id` and run Dijkstra from it.
pub fn shortest_paths_from(graph: &Graph, source_id: &str) -> Result<ShortestPaths> {
    let source = graph.lookup(source_id)?;
    shortest_paths(graph, source)
}
