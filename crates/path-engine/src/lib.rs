//! In-memory weighted graph service answering shortest-path queries.
//!
//! A graph description is validated into a [`graph::Graph`] by
//! [`ingest::GraphLoader`], held as the process-wide [`state::ActiveGraph`],
//! and queried through [`server::PathGraphService`]. Queries run Dijkstra
//! into a separate [`dijkstra::ShortestPaths`] so the shared graph is never
//! mutated.

pub mod config;
pub mod dijkstra;
pub mod error;
mod frontier;
pub mod graph;
pub mod ingest;
pub mod logging;
pub mod route;
pub mod rpc_stdio;
pub mod rpc_types;
pub mod server;
pub mod state;

pub use dijkstra::{shortest_paths, shortest_paths_from, ShortestPaths};
pub use error::{GraphError, Result};
pub use graph::{Edge, Graph, Node, NodeIndex};
pub use ingest::GraphLoader;
pub use route::{shortest_route, Route};
pub use server::PathGraphService;
