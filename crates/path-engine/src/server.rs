use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::ingest::GraphLoader;
use crate::route::shortest_route;
use crate::rpc_types::{RpcError, RpcRequest, RpcResponse, SolveParams, UploadParams, JSONRPC_VERSION};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use serde_json::value::RawValue;
use serde_json::Value;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use uuid::Uuid;

pub use crate::state::{ActiveGraph, LoadedGraph};

pub const WELCOME_MESSAGE: &str = "Welcome to the Shortest Path Solver!";

#[derive(Debug, Clone, Serialize)]
pub struct Welcome {
    pub message: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadSummary {
    pub status: &'static str,
    pub message: &'static str,
    pub graph_id: Uuid,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Solution {
    pub status: &'static str,
    pub path: Vec<String>,
    pub total_distance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GraphInfo {
    pub graph_id: Uuid,
    pub loaded_at: DateTime<Utc>,
    pub node_count: usize,
    pub edge_count: usize,
    pub nodes: Vec<String>,
}

/// Shortest-path service over the process-wide active graph.
///
/// Clones share the same [`ActiveGraph`].
#[derive(Debug, Clone, Default)]
pub struct PathGraphService {
    active: Arc<ActiveGraph>,
    /// Root for `upload_graph` calls that name a `path`. `None` disables them.
    upload_dir: Option<PathBuf>,
}

impl PathGraphService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(active: Arc<ActiveGraph>) -> Self {
        Self {
            active,
            upload_dir: None,
        }
    }

    /// Allow RPC clients to upload graph files found under `dir`.
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    pub fn state(&self) -> &Arc<ActiveGraph> {
        &self.active
    }

    pub fn welcome(&self) -> Welcome {
        Welcome {
            message: WELCOME_MESSAGE,
        }
    }

    /// Parse, validate and activate a graph document. On failure the
    /// previously active graph stays in place.
    pub fn upload_graph_json(&self, json: &str) -> Result<UploadSummary> {
        let graph = GraphLoader::from_json_str(json).map_err(log_rejected)?;
        Ok(self.activate(graph))
    }

    pub fn upload_graph_value(&self, value: Value) -> Result<UploadSummary> {
        let graph = GraphLoader::from_value(value).map_err(log_rejected)?;
        Ok(self.activate(graph))
    }

    /// Load a graph file from any readable location. RPC clients go through
    /// [`Self::resolve_upload_path`] first.
    pub fn upload_graph_file(&self, path: &Path) -> Result<UploadSummary> {
        let graph = GraphLoader::from_file(path).map_err(log_rejected)?;
        Ok(self.activate(graph))
    }

    /// Confine a client-supplied path to the upload directory. Relative paths
    /// resolve against it. The error does not say whether the file exists.
    pub fn resolve_upload_path(&self, requested: &Path) -> std::result::Result<PathBuf, RpcError> {
        let Some(dir) = &self.upload_dir else {
            return Err(RpcError::invalid_params(
                "file uploads are disabled on this server",
            ));
        };

        let outside = || {
            tracing::warn!(path = %requested.display(), "graph path rejected");
            RpcError::invalid_params("`path` must name a file inside the upload directory")
        };
        let root = dir.canonicalize().map_err(|_| outside())?;
        let resolved = root.join(requested).canonicalize().map_err(|_| outside())?;
        if resolved.starts_with(&root) && resolved.is_file() {
            Ok(resolved)
        } else {
            Err(outside())
        }
    }

    /// Make an already validated graph the active one.
    pub fn activate(&self, graph: Graph) -> UploadSummary {
        let (loaded, _) = self.active.replace(graph);
        UploadSummary {
            status: "ok",
            message: "Graph uploaded and ready!",
            graph_id: loaded.graph_id,
            node_count: loaded.graph.num_nodes(),
            edge_count: loaded.graph.num_edges(),
            nodes: loaded.graph.node_ids().map(str::to_string).collect(),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn solve_shortest_path(&self, start_node_id: &str, end_node_id: &str) -> Result<Solution> {
        let loaded = self.active.current()?;
        let route = shortest_route(&loaded.graph, start_node_id, end_node_id)?;
        tracing::debug!(
            graph_id = %loaded.graph_id,
            hops = route.hops(),
            total_distance = route.total_distance,
            "path solved"
        );
        Ok(Solution {
            status: "ok",
            path: route.path,
            total_distance: route.total_distance,
        })
    }

    pub fn graph_info(&self) -> Result<GraphInfo> {
        let loaded = self.active.current()?;
        Ok(GraphInfo {
            graph_id: loaded.graph_id,
            loaded_at: loaded.loaded_at,
            node_count: loaded.graph.num_nodes(),
            edge_count: loaded.graph.num_edges(),
            nodes: loaded.graph.node_ids().map(str::to_string).collect(),
        })
    }

    /// Handle one JSON-RPC line and return the serialized response, or
    /// `None` for notifications.
    pub fn handle_line(&self, line: &str) -> Option<String> {
        let response = match serde_json::from_str::<RpcRequest>(line) {
            Ok(request) => self.dispatch(request)?,
            Err(e) => {
                let error = if serde_json::from_str::<IgnoredAny>(line).is_ok() {
                    RpcError::invalid_request(e)
                } else {
                    RpcError::parse_error(e)
                };
                RpcResponse::failure(Value::Null, error)
            }
        };

        match serde_json::to_string(&response) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response");
                None
            }
        }
    }

    pub fn dispatch(&self, request: RpcRequest) -> Option<RpcResponse> {
        let RpcRequest {
            jsonrpc,
            id,
            method,
            params,
        } = request;

        let outcome = if jsonrpc != JSONRPC_VERSION {
            Err(RpcError::invalid_request(format!(
                "unsupported jsonrpc version {:?}",
                jsonrpc
            )))
        } else {
            self.call(&method, params.as_deref())
        };

        let id = id?;
        Some(match outcome {
            Ok(result) => RpcResponse::success(id, result),
            Err(error) => RpcResponse::failure(id, error),
        })
    }

    fn call(&self, method: &str, params: Option<&RawValue>) -> std::result::Result<Value, RpcError> {
        tracing::debug!(method, "rpc call");
        match method {
            "welcome" => to_result(Ok(self.welcome())),
            "upload_graph" => {
                let params: UploadParams = parse_params(params)?;
                let summary = match (params.graph, params.path) {
                    (Some(graph), None) => self.upload_graph_json(graph.get()),
                    (None, Some(path)) => {
                        let path = self.resolve_upload_path(&path)?;
                        self.upload_graph_file(&path)
                    }
                    _ => {
                        return Err(RpcError::invalid_params(
                            "expected exactly one of `graph` or `path`",
                        ))
                    }
                };
                to_result(summary)
            }
            "solve_shortest_path" => {
                let params: SolveParams = parse_params(params)?;
                to_result(self.solve_shortest_path(&params.start_node_id, &params.end_node_id))
            }
            "graph_info" => to_result(self.graph_info()),
            other => Err(RpcError::method_not_found(other)),
        }
    }
}

fn log_rejected(err: GraphError) -> GraphError {
    tracing::warn!(kind = err.kind(), error = %err, "graph upload rejected");
    err
}

fn parse_params<T: DeserializeOwned>(params: Option<&RawValue>) -> std::result::Result<T, RpcError> {
    let raw = params.map(RawValue::get).unwrap_or("{}");
    serde_json::from_str(raw).map_err(RpcError::invalid_params)
}

fn to_result<T: Serialize>(outcome: Result<T>) -> std::result::Result<Value, RpcError> {
    let value = outcome?;
    serde_json::to_value(value).map_err(RpcError::internal)
}

/// What to do after `accept` fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcceptAction {
    /// Try again after the given pause.
    Retry(Duration),
    Fatal,
}

const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

fn accept_error_action(err: &io::Error) -> AcceptAction {
    match err.kind() {
        // A peer gave up before we got to it.
        io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock => AcceptAction::Retry(Duration::ZERO),
        io::ErrorKind::InvalidInput => AcceptAction::Fatal,
        // Resource exhaustion (EMFILE, ENFILE, ENOBUFS) clears as connections close.
        _ => AcceptAction::Retry(ACCEPT_BACKOFF),
    }
}

/// Accept connections forever, one task per connection.
///
/// Accept failures are logged and retried; only a listener that can no
/// longer accept ends the loop.
pub async fn serve(
    service: PathGraphService,
    listener: TcpListener,
    max_line_bytes: usize,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => match accept_error_action(&e) {
                AcceptAction::Retry(pause) => {
                    let backoff_ms = pause.as_millis() as u64;
                    tracing::warn!(error = %e, backoff_ms, "accept failed");
                    if !pause.is_zero() {
                        tokio::time::sleep(pause).await;
                    }
                    continue;
                }
                AcceptAction::Fatal => return Err(e.into()),
            },
        };
        let service = service.clone();
        tokio::spawn(async move {
            tracing::debug!(%peer, "connection opened");
            if let Err(e) = handle_connection(service, socket, max_line_bytes).await {
                tracing::warn!(%peer, error = %e, "connection failed");
            }
            tracing::debug!(%peer, "connection closed");
        });
    }
}

async fn handle_connection(
    service: PathGraphService,
    socket: TcpStream,
    max_line_bytes: usize,
) -> anyhow::Result<()> {
    let (reader, writer) = socket.into_split();
    serve_lines(service, reader, writer, max_line_bytes).await
}

/// Answer newline-delimited JSON-RPC requests from `reader` on `writer`
/// until the reader closes or sends a line longer than `max_line_bytes`.
pub async fn serve_lines<R, W>(
    service: PathGraphService,
    reader: R,
    writer: W,
    max_line_bytes: usize,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut requests = FramedRead::new(reader, LinesCodec::new_with_max_length(max_line_bytes));
    let mut replies = FramedWrite::new(writer, LinesCodec::new());

    while let Some(line) = requests.next().await {
        let line = match line {
            Ok(line) => line,
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                tracing::warn!(max_line_bytes, "request line too long, closing");
                break;
            }
            Err(LinesCodecError::Io(e)) => return Err(e.into()),
        };
        if line.trim().is_empty() {
            continue;
        }

        // Dijkstra and file reads are synchronous; keep them off the reactor.
        let service = service.clone();
        let reply = tokio::task::spawn_blocking(move || service.handle_line(&line)).await?;
        if let Some(reply) = reply {
            replies.send(reply).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_A: &str = r#"{"nodes": {
        "A": {"edges": [{"target": "B", "weight": 1}, {"target": "C", "weight": 5}]},
        "B": {"edges": [{"target": "C", "weight": 2}]},
        "C": {}
    }}"#;

    fn rpc(service: &PathGraphService, line: &str) -> Value {
        let reply = service.handle_line(line).expect("expected a response");
        serde_json::from_str(&reply).unwrap()
    }

    #[test]
    fn test_upload_then_solve() {
        let service = PathGraphService::new();
        let summary = service.upload_graph_json(SCENARIO_A).unwrap();
        assert_eq!(summary.node_count, 3);
        assert_eq!(summary.edge_count, 3);
        assert_eq!(summary.nodes, vec!["A", "B", "C"]);

        let solution = service.solve_shortest_path("A", "C").unwrap();
        assert_eq!(solution.path, vec!["A", "B", "C"]);
        assert_eq!(solution.total_distance, 3.0);
    }

    #[test]
    fn test_query_before_upload() {
        let service = PathGraphService::new();
        assert_eq!(
            service.solve_shortest_path("A", "B").unwrap_err(),
            GraphError::NoActiveGraph
        );
        assert_eq!(service.graph_info().unwrap_err(), GraphError::NoActiveGraph);
    }

    #[test]
    fn test_rejected_upload_keeps_previous_graph() {
        let service = PathGraphService::new();
        let first = service.upload_graph_json(SCENARIO_A).unwrap();

        let err = service
            .upload_graph_json(
                r#"{"nodes": {"A": {"edges": [{"target": "B", "weight": -1}]}, "B": {}}}"#,
            )
            .unwrap_err();
        assert_eq!(err.kind(), "invalid_weight");
        assert_eq!(service.graph_info().unwrap().graph_id, first.graph_id);
    }

    #[test]
    fn test_rpc_round_trip() {
        let service = PathGraphService::new();
        let upload = format!(
            r#"{{"jsonrpc":"2.0","id":1,"method":"upload_graph","params":{{"graph":{}}}}}"#,
            SCENARIO_A
        );
        let reply = rpc(&service, &upload);
        assert_eq!(reply["id"], 1);
        assert_eq!(reply["result"]["node_count"], 3);

        let reply = rpc(
            &service,
            r#"{"jsonrpc":"2.0","id":"q","method":"solve_shortest_path","params":{"start_node_id":"A","end_node_id":"C"}}"#,
        );
        assert_eq!(reply["result"]["path"], serde_json::json!(["A", "B", "C"]));
        assert_eq!(reply["result"]["total_distance"], 3.0);
    }

    #[test]
    fn test_rpc_errors() {
        let service = PathGraphService::new();

        let reply = rpc(&service, "{not json");
        assert_eq!(reply["error"]["code"], -32700);

        let reply = rpc(&service, r#"{"hello": "world"}"#);
        assert_eq!(reply["error"]["code"], -32600);

        let reply = rpc(&service, r#"{"jsonrpc":"1.0","id":1,"method":"welcome"}"#);
        assert_eq!(reply["error"]["code"], -32600);

        let reply = rpc(&service, r#"{"jsonrpc":"2.0","id":1,"method":"nope"}"#);
        assert_eq!(reply["error"]["code"], -32601);

        let reply = rpc(
            &service,
            r#"{"jsonrpc":"2.0","id":1,"method":"solve_shortest_path","params":{"start_node_id":"A"}}"#,
        );
        assert_eq!(reply["error"]["code"], -32602);

        let reply = rpc(
            &service,
            r#"{"jsonrpc":"2.0","id":1,"method":"solve_shortest_path","params":{"start_node_id":"A","end_node_id":"B"}}"#,
        );
        assert_eq!(reply["error"]["code"], -32000);
        assert_eq!(reply["error"]["data"]["kind"], "no_active_graph");

        let reply = rpc(
            &service,
            r#"{"jsonrpc":"2.0","id":1,"method":"upload_graph","params":{}}"#,
        );
        assert_eq!(reply["error"]["code"], -32602);
    }

    #[test]
    fn test_notifications_get_no_reply() {
        let service = PathGraphService::new();
        assert!(service
            .handle_line(r#"{"jsonrpc":"2.0","method":"welcome"}"#)
            .is_none());
        // Notifications still take effect.
        assert!(service
            .handle_line(r#"{"jsonrpc":"2.0","method":"upload_graph","params":{"graph":{"nodes":{"A":{}}}}}"#)
            .is_none());
        assert_eq!(service.graph_info().unwrap().node_count, 1);
    }

    #[test]
    fn test_accept_errors_are_retried() {
        let aborted = io::Error::from(io::ErrorKind::ConnectionAborted);
        assert_eq!(accept_error_action(&aborted), AcceptAction::Retry(Duration::ZERO));

        let other = io::Error::new(io::ErrorKind::Other, "too many open files");
        assert_eq!(accept_error_action(&other), AcceptAction::Retry(ACCEPT_BACKOFF));

        let invalid = io::Error::from(io::ErrorKind::InvalidInput);
        assert_eq!(accept_error_action(&invalid), AcceptAction::Fatal);
    }

    #[cfg(unix)]
    #[test]
    fn test_fd_exhaustion_backs_off() {
        // EMFILE and ENFILE
        for errno in [24, 23] {
            let err = io::Error::from_raw_os_error(errno);
            assert_eq!(accept_error_action(&err), AcceptAction::Retry(ACCEPT_BACKOFF));
        }
    }

    fn upload_path_line(path: &str) -> String {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "upload_graph",
            "params": {"path": path}
        })
        .to_string()
    }

    #[test]
    fn test_path_uploads_disabled_by_default() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("graph.json");
        std::fs::write(&file, SCENARIO_A).unwrap();

        let service = PathGraphService::new();
        let reply = rpc(&service, &upload_path_line(&file.to_string_lossy()));
        assert_eq!(reply["error"]["code"], -32602);
        assert!(service.graph_info().is_err());

        // The library call used for startup graphs is not confined.
        assert_eq!(service.upload_graph_file(&file).unwrap().node_count, 3);
    }

    #[test]
    fn test_path_uploads_confined_to_upload_dir() {
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.json");
        std::fs::write(&secret, SCENARIO_A).unwrap();

        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir(root.path().join("graphs")).unwrap();
        std::fs::write(root.path().join("graphs").join("a.json"), SCENARIO_A).unwrap();
        let service = PathGraphService::new().with_upload_dir(root.path().join("graphs"));

        let reply = rpc(&service, &upload_path_line("a.json"));
        assert_eq!(reply["result"]["node_count"], 3);

        let escapes = [
            secret.to_string_lossy().into_owned(),
            "../graphs/../../etc/passwd".to_string(),
            "missing.json".to_string(),
            ".".to_string(),
        ];
        for path in &escapes {
            let reply = rpc(&service, &upload_path_line(path));
            assert_eq!(reply["error"]["code"], -32602, "path {}", path);
            // Same message whether or not the file exists.
            assert_eq!(
                reply["error"]["message"],
                "invalid params: `path` must name a file inside the upload directory"
            );
        }
    }

    #[tokio::test]
    async fn test_serve_lines_answers_each_request() {
        let input = format!(
            "{}\n\n{}\n{}\n",
            r#"{"jsonrpc":"2.0","id":1,"method":"welcome"}"#,
            r#"{"jsonrpc":"2.0","method":"welcome"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"graph_info"}"#,
        );
        let mut output = Vec::new();
        serve_lines(PathGraphService::new(), input.as_bytes(), &mut output, 1024)
            .await
            .unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0]["result"]["message"], WELCOME_MESSAGE);
        assert_eq!(replies[1]["error"]["data"]["kind"], "no_active_graph");
    }

    #[tokio::test]
    async fn test_serve_lines_stops_at_oversized_line() {
        let input = format!(
            "{}\n{}\n{}\n",
            r#"{"jsonrpc":"2.0","id":1,"method":"welcome"}"#,
            "x".repeat(200),
            r#"{"jsonrpc":"2.0","id":2,"method":"welcome"}"#,
        );
        let mut output = Vec::new();
        serve_lines(PathGraphService::new(), input.as_bytes(), &mut output, 64)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.contains(r#""id":1"#));
    }

    #[test]
    fn test_welcome() {
        let service = PathGraphService::new();
        let reply = rpc(&service, r#"{"jsonrpc":"2.0","id":0,"method":"welcome"}"#);
        assert_eq!(reply["result"]["message"], WELCOME_MESSAGE);
    }
}
