use anyhow::Context;
use clap::Parser;
use pathgraph_core::config::ServerConfig;
use pathgraph_core::logging::init_tracing;
use pathgraph_core::rpc_stdio::run_stdio;
use pathgraph_core::server::{serve, PathGraphService};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    init_tracing(config.log_level.as_deref(), config.log_json)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    let mut service = PathGraphService::new();
    if let Some(dir) = &config.upload_dir {
        tracing::info!(dir = %dir.display(), "file uploads enabled");
        service = service.with_upload_dir(dir);
    }

    if let Some(path) = &config.graph_path {
        let summary = service
            .upload_graph_file(path)
            .with_context(|| format!("failed to load graph from {}", path.display()))?;
        tracing::info!(
            path = %path.display(),
            graph_id = %summary.graph_id,
            nodes = summary.node_count,
            edges = summary.edge_count,
            "startup graph loaded"
        );
    }

    if config.stdio {
        tracing::info!("serving over stdio");
        run_stdio(service, config.max_line_bytes).await?;
        return Ok(());
    }

    let listener = TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    tracing::info!(addr = %listener.local_addr()?, "shortest path solver listening");

    tokio::select! {
        result = serve(service, listener, config.max_line_bytes) => result?,
        _ = tokio::signal::ctrl_c() => tracing::info!("shutting down"),
    }

    Ok(())
}
