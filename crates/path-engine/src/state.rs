use crate::error::{GraphError, Result};
use crate::graph::Graph;
use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use uuid::Uuid;

/// A graph together with its upload metadata.
#[derive(Debug)]
pub struct LoadedGraph {
    pub graph_id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub graph: Graph,
}

impl LoadedGraph {
    pub fn new(graph: Graph) -> Self {
        Self {
            graph_id: Uuid::new_v4(),
            loaded_at: Utc::now(),
            graph,
        }
    }
}

/// The single active graph of the process.
///
/// Readers clone the `Arc` and release the lock before computing, so a
/// replacement never waits on running queries and a query always sees one
/// whole graph.
#[derive(Debug, Default)]
pub struct ActiveGraph {
    current: RwLock<Option<Arc<LoadedGraph>>>,
}

impl ActiveGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Swap in `graph`, returning the id of the graph it replaced.
    pub fn replace(&self, graph: Graph) -> (Arc<LoadedGraph>, Option<Uuid>) {
        let loaded = Arc::new(LoadedGraph::new(graph));
        // The guarded value is a single pointer, so a poisoned lock still
        // holds a consistent state.
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let previous = slot.replace(Arc::clone(&loaded));
        drop(slot);

        let previous_id = previous.map(|p| p.graph_id);
        tracing::info!(
            graph_id = %loaded.graph_id,
            replaced = ?previous_id,
            nodes = loaded.graph.num_nodes(),
            "active graph replaced"
        );
        (loaded, previous_id)
    }

    /// The active graph, or `NoActiveGraph` before the first load.
    pub fn current(&self) -> Result<Arc<LoadedGraph>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(GraphError::NoActiveGraph)
    }

    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}
