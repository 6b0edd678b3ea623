use crate::error::{GraphError, Result};
use std::collections::HashMap;

/// Dense handle of a node inside its owning [`Graph`].
pub type NodeIndex = u32;

/// A directed, weighted edge. Undirected links are stored as two edges.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub target: NodeIndex,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct Node {
    id: String,
    edges: Vec<Edge>,
}

impl Node {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }
}

/// Weighted graph as an adjacency list keyed by dense indices.
///
/// Nodes keep their declaration order, so listing is stable across calls.
/// The graph owns every node and edge; path state lives elsewhere
/// (see [`crate::dijkstra::ShortestPaths`]), which keeps a `Graph` read-only
/// once built and safe to share between concurrent queries.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            index: HashMap::with_capacity(nodes),
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.nodes.iter().map(|node| node.edges.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declare a node. Ids must be non-empty and unique.
    pub fn add_node(&mut self, id: &str) -> Result<NodeIndex> {
        if id.is_empty() {
            return Err(GraphError::malformed("node id must not be empty"));
        }
        if self.index.contains_key(id) {
            return Err(GraphError::malformed(format!("duplicate node id: {}", id)));
        }

        let idx = NodeIndex::try_from(self.nodes.len())
            .map_err(|_| GraphError::malformed("too many nodes"))?;
        self.nodes.push(Node {
            id: id.to_string(),
            edges: Vec::new(),
        });
        self.index.insert(id.to_string(), idx);
        Ok(idx)
    }

    /// Add a directed edge between two declared nodes.
    pub fn add_edge(&mut self, src: NodeIndex, dst: NodeIndex, weight: f64) -> Result<()> {
        if dst as usize >= self.nodes.len() {
            return Err(GraphError::malformed(format!(
                "edge target index {} out of range",
                dst
            )));
        }
        let label = match self.nodes.get(src as usize) {
            Some(node) => format!("{}->{}", node.id, self.nodes[dst as usize].id),
            None => {
                return Err(GraphError::malformed(format!(
                    "edge source index {} out of range",
                    src
                )))
            }
        };
        let weight = validate_weight(weight, &label)?;

        self.nodes[src as usize].edges.push(Edge {
            target: dst,
            weight,
        });
        Ok(())
    }

    /// Add an edge in both directions with the same weight.
    pub fn add_undirected_edge(&mut self, a: NodeIndex, b: NodeIndex, weight: f64) -> Result<()> {
        self.add_edge(a, b, weight)?;
        self.add_edge(b, a, weight)
    }

    /// Resolve a node id to its index.
    pub fn lookup(&self, id: &str) -> Result<NodeIndex> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::node_not_found(id))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&Node> {
        self.nodes.get(idx as usize)
    }

    /// Id of the node at `idx`.
    ///
    /// Panics if `idx` did not come from this graph.
    pub fn id_of(&self, idx: NodeIndex) -> &str {
        &self.nodes[idx as usize].id
    }

    /// All node ids in declaration order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    /// Outgoing edges of `idx`; empty for an unknown index.
    pub fn edges(&self, idx: NodeIndex) -> impl Iterator<Item = &Edge> + '_ {
        self.nodes
            .get(idx as usize)
            .into_iter()
            .flat_map(|node| node.edges.iter())
    }
}

/// Weights must be finite and non-negative for Dijkstra to be correct.
pub fn validate_weight(weight: f64, edge: &str) -> Result<f64> {
    if weight.is_nan() {
        return Err(GraphError::invalid_weight(edge, "weight is NaN"));
    }
    if weight.is_infinite() {
        return Err(GraphError::invalid_weight(edge, "weight is infinite"));
    }
    if weight < 0.0 {
        return Err(GraphError::invalid_weight(
            edge,
            format!("weight {} is negative", weight),
        ));
    }
    Ok(weight)
}
