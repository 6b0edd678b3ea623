//! Error taxonomy for graph loading and shortest-path queries.
//!
//! Every variant is detected synchronously and none are transient, so
//! nothing here is retried. Callers branch on [`GraphError::kind`] or
//! [`GraphError::status`] to tell the cases apart.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

/// Errors produced while building a graph or answering a query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    // Client input (status 400)
    #[error("malformed graph: {reason}")]
    MalformedGraph { reason: String },

    #[error("invalid weight on edge {edge}: {reason}")]
    InvalidWeight { edge: String, reason: String },

    // Unknown node (status 404)
    #[error("node not found: {id}")]
    NodeNotFound { id: String },

    // Precondition (status 400)
    #[error("no graph yet, upload a graph first")]
    NoActiveGraph,

    // Unreachable target (status 422)
    #[error("no path from {from} to {to}")]
    NoPathExists { from: String, to: String },
}

impl GraphError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        GraphError::MalformedGraph {
            reason: reason.into(),
        }
    }

    pub fn invalid_weight(edge: impl Into<String>, reason: impl Into<String>) -> Self {
        GraphError::InvalidWeight {
            edge: edge.into(),
            reason: reason.into(),
        }
    }

    pub fn node_not_found(id: impl Into<String>) -> Self {
        GraphError::NodeNotFound { id: id.into() }
    }

    /// Stable machine-readable identifier for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            GraphError::MalformedGraph { .. } => "malformed_graph",
            GraphError::InvalidWeight { .. } => "invalid_weight",
            GraphError::NodeNotFound { .. } => "node_not_found",
            GraphError::NoActiveGraph => "no_active_graph",
            GraphError::NoPathExists { .. } => "no_path_exists",
        }
    }

    /// HTTP-style status code for the category.
    pub fn status(&self) -> u16 {
        match self {
            GraphError::MalformedGraph { .. }
            | GraphError::InvalidWeight { .. }
            | GraphError::NoActiveGraph => 400,
            GraphError::NodeNotFound { .. } => 404,
            GraphError::NoPathExists { .. } => 422,
        }
    }

    /// True for errors caused by the submitted graph description.
    pub fn is_client_input(&self) -> bool {
        matches!(
            self,
            GraphError::MalformedGraph { .. } | GraphError::InvalidWeight { .. }
        )
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::malformed(err.to_string())
    }
}
