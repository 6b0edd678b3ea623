use crate::server::{serve_lines, PathGraphService};
use tokio::io::{stdin, stdout};

/// Serve the JSON-RPC protocol over stdin/stdout until stdin closes or
/// sends a line longer than `max_line_bytes`.
///
/// Logs go to stderr; stdout carries responses only.
pub async fn run_stdio(service: PathGraphService, max_line_bytes: usize) -> anyhow::Result<()> {
    serve_lines(service, stdin(), stdout(), max_line_bytes).await?;
    tracing::info!("stdin closed, stopping");
    Ok(())
}
