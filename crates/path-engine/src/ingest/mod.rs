use crate::error::{GraphError, Result};
use crate::graph::{validate_weight, Graph, NodeIndex};
use serde_json::value::RawValue;
use serde_json::Value;
use std::fs;
use std::path::Path;

pub mod description;

use description::GraphDescription;

/// Builds validated [`Graph`]s from JSON graph descriptions.
pub struct GraphLoader;

impl GraphLoader {
    pub fn from_json_str(json: &str) -> Result<Graph> {
        let desc: GraphDescription = serde_json::from_str(json)?;
        Self::build(desc)
    }

    pub fn from_json_slice(bytes: &[u8]) -> Result<Graph> {
        let desc: GraphDescription = serde_json::from_slice(bytes)?;
        Self::build(desc)
    }

    /// Duplicate node ids cannot be detected here since a `Value` object
    /// has already collapsed them; prefer the string entry points.
    pub fn from_value(value: Value) -> Result<Graph> {
        let desc: GraphDescription = serde_json::from_value(value)?;
        Self::build(desc)
    }

    #[tracing::instrument]
    pub fn from_file(path: &Path) -> Result<Graph> {
        let bytes = fs::read(path).map_err(|e| {
            GraphError::malformed(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json_slice(&bytes)
    }

    /// Validate a parsed description and build the graph.
    ///
    /// All nodes are declared first, then embedded edges in node order, then
    /// listed edges. Each edge is checked for undeclared endpoints before
    /// its weight.
    ///
    /// Weights are capped at [`max_weight_for`] the node count so no simple
    /// path can sum past `f64::MAX`.
    pub fn build(desc: GraphDescription) -> Result<Graph> {
        let mut graph = Graph::with_capacity(desc.nodes.0.len());
        for (id, _) in &desc.nodes.0 {
            graph.add_node(id)?;
        }
        let limit = max_weight_for(graph.num_nodes());

        for (source, body) in &desc.nodes.0 {
            for edge in &body.edges {
                add_described_edge(
                    &mut graph,
                    source,
                    &edge.target,
                    edge.weight.as_deref(),
                    desc.directed,
                    limit,
                )?;
            }
        }

        for edge in &desc.edges {
            add_described_edge(
                &mut graph,
                &edge.source,
                &edge.target,
                edge.weight.as_deref(),
                desc.directed,
                limit,
            )?;
        }

        tracing::debug!(
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            directed = desc.directed,
            "graph built"
        );
        Ok(graph)
    }
}

/// Largest edge weight accepted in a graph of `num_nodes` nodes.
///
/// A simple path has fewer than `num_nodes` edges, so any path sum stays
/// finite.
pub fn max_weight_for(num_nodes: usize) -> f64 {
    f64::MAX / (num_nodes as f64 + 1.0)
}

fn add_described_edge(
    graph: &mut Graph,
    source: &str,
    target: &str,
    weight: Option<&RawValue>,
    directed: bool,
    limit: f64,
) -> Result<()> {
    let label = format!("{}->{}", source, target);
    let src = resolve_endpoint(graph, source, &label)?;
    let dst = resolve_endpoint(graph, target, &label)?;
    let weight = parse_weight(weight, &label, limit)?;

    if directed {
        graph.add_edge(src, dst, weight)
    } else {
        graph.add_undirected_edge(src, dst, weight)
    }
}

fn resolve_endpoint(graph: &Graph, id: &str, label: &str) -> Result<NodeIndex> {
    graph.lookup(id).map_err(|_| {
        GraphError::malformed(format!("edge {} references undeclared node {}", label, id))
    })
}

/// Read a weight from its raw JSON text. Number literals too large for
/// `f64` (e.g. `1e400`) parse to infinity and are rejected as weights.
fn parse_weight(raw: Option<&RawValue>, label: &str, limit: f64) -> Result<f64> {
    let text = match raw.map(|r| r.get().trim()) {
        None | Some("null") => return Err(GraphError::invalid_weight(label, "weight is missing")),
        Some(text) => text,
    };
    let is_number = text.starts_with('-') || text.starts_with(|c: char| c.is_ascii_digit());
    if !is_number {
        return Err(GraphError::invalid_weight(
            label,
            format!("weight must be a number, got {}", text),
        ));
    }
    let weight: f64 = text.parse().map_err(|_| {
        GraphError::invalid_weight(label, format!("weight {} is not representable", text))
    })?;

    let weight = validate_weight(weight, label)?;
    if weight > limit {
        return Err(GraphError::invalid_weight(
            label,
            format!("weight {} exceeds the limit of {:e} for this graph", text, limit),
        ));
    }
    Ok(weight)
}
