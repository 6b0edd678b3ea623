//! Wire schema of an uploaded graph description.
//!
//! Parsing is strict: unknown fields are rejected and node declaration order
//! is kept exactly as written in the document.

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer};
use serde_json::value::RawValue;
use std::collections::HashSet;
use std::fmt;

fn default_directed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GraphDescription {
    /// When false every edge is also added in the reverse direction.
    #[serde(default = "default_directed")]
    pub directed: bool,
    pub nodes: NodeDeclarations,
    /// Edges listed separately from their source node.
    #[serde(default)]
    pub edges: Vec<ListedEdge>,
}

/// Node declarations in document order.
#[derive(Debug, Default)]
pub struct NodeDeclarations(pub Vec<(String, NodeBody)>);

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeBody {
    #[serde(default)]
    pub edges: Vec<EmbeddedEdge>,
}

/// Edge declared inside its source node's body.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmbeddedEdge {
    pub target: String,
    /// Kept raw so a missing, non-numeric or out-of-range weight is
    /// reported as a weight error rather than a schema error.
    #[serde(default)]
    pub weight: Option<Box<RawValue>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ListedEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: Option<Box<RawValue>>,
}

impl<'de> Deserialize<'de> for NodeDeclarations {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DeclarationsVisitor;

        impl<'de> Visitor<'de> for DeclarationsVisitor {
            type Value = NodeDeclarations;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object mapping node ids to node bodies")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut seen = HashSet::new();
                let mut nodes = Vec::with_capacity(map.size_hint().unwrap_or(0));

                while let Some(id) = map.next_key::<String>()? {
                    let body: Option<NodeBody> = map.next_value()?;
                    if !seen.insert(id.clone()) {
                        return Err(de::Error::custom(format!("duplicate node id: {}", id)));
                    }
                    nodes.push((id, body.unwrap_or_default()));
                }

                Ok(NodeDeclarations(nodes))
            }
        }

        deserializer.deserialize_map(DeclarationsVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_order_is_kept() {
        let desc: GraphDescription =
            serde_json::from_str(r#"{"nodes": {"Z": {}, "A": null, "M": {"edges": []}}}"#)
                .unwrap();
        let ids: Vec<_> = desc.nodes.0.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["Z", "A", "M"]);
        assert!(desc.directed);
        assert!(desc.edges.is_empty());
    }

    #[test]
    fn test_duplicate_node_rejected() {
        let err = serde_json::from_str::<GraphDescription>(r#"{"nodes": {"A": {}, "A": {}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("duplicate node id: A"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        assert!(serde_json::from_str::<GraphDescription>(r#"{"nodes": {}, "extra": 1}"#).is_err());
        assert!(
            serde_json::from_str::<GraphDescription>(r#"{"nodes": {"A": {"colour": "red"}}}"#)
                .is_err()
        );
    }

    #[test]
    fn test_nodes_must_be_an_object() {
        assert!(serde_json::from_str::<GraphDescription>(r#"{"nodes": ["A", "B"]}"#).is_err());
        assert!(serde_json::from_str::<GraphDescription>(r#"{}"#).is_err());
    }

    #[test]
    fn test_weight_is_left_raw() {
        let desc: GraphDescription = serde_json::from_str(
            r#"{"nodes": {"A": {"edges": [{"target": "B", "weight": "heavy"}, {"target": "B", "weight": 1e400}]}, "B": {}}}"#,
        )
        .unwrap();
        let edges = &desc.nodes.0[0].1.edges;
        assert_eq!(edges[0].weight.as_deref().map(RawValue::get), Some(r#""heavy""#));
        // Out-of-range literals survive the document parse.
        assert_eq!(edges[1].weight.as_deref().map(RawValue::get), Some("1e400"));
    }
}
