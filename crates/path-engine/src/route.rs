use crate::dijkstra::{shortest_paths, ShortestPaths};
use crate::error::{GraphError, Result};
use crate::graph::{Graph, NodeIndex};
use serde::Serialize;

/// An ordered source-to-target path and its total cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub path: Vec<String>,
    pub total_distance: f64,
}

impl Route {
    /// Number of edges on the route.
    pub fn hops(&self) -> usize {
        self.path.len().saturating_sub(1)
    }
}

impl ShortestPaths {
    /// Walk predecessor links back from `target` and return the node indices
    /// in source-to-target order.
    ///
    /// The caller must have checked that `target` is reachable; an unreached
    /// target has no predecessor and would yield a lone-node path.
    pub fn walk_predecessors(&self, target: NodeIndex) -> Vec<NodeIndex> {
        let mut reversed = vec![target];
        let mut current = target;
        // A predecessor chain visits each node at most once.
        while let Some(prev) = self.predecessor(current) {
            if reversed.len() > self.num_nodes() {
                tracing::error!(node = target, "predecessor chain does not terminate");
                break;
            }
            reversed.push(prev);
            current = prev;
        }
        reversed.reverse();
        reversed
    }

    /// Build the [`Route`] to `target`, or `NoPathExists` when it was not
    /// reached from the source.
    pub fn route_to(&self, graph: &Graph, target: NodeIndex) -> Result<Route> {
        if graph.node(target).is_none() {
            return Err(GraphError::node_not_found(format!("#{}", target)));
        }

        let total_distance = self.distance(target);
        if !total_distance.is_finite() {
            return Err(GraphError::NoPathExists {
                from: graph.id_of(self.source()).to_string(),
                to: graph.id_of(target).to_string(),
            });
        }

        let path = self
            .walk_predecessors(target)
            .into_iter()
            .map(|idx| graph.id_of(idx).to_string())
            .collect();

        Ok(Route {
            path,
            total_distance,
        })
    }
}

/// Shortest route between two node ids of `graph`.
///
/// Both ids are resolved before any computation, so an unknown id is always
/// reported as `NodeNotFound` rather than as an unreachable target.
pub fn shortest_route(graph: &Graph, start_id: &str, end_id: &str) -> Result<Route> {
    let start = graph.lookup(start_id)?;
    let end = graph.lookup(end_id)?;
    shortest_paths(graph, start)?.route_to(graph, end)
}
