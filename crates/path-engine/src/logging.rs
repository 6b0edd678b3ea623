use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type InitError = Box<dyn std::error::Error + Send + Sync>;

/// Initialize structured logging on stderr.
///
/// See [`filter_directive`] for how the level is chosen.
pub fn init_tracing(log_level: Option<&str>, log_json: bool) -> Result<(), InitError> {
    let directive = filter_directive(log_level, |key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive)?;

    let registry = tracing_subscriber::registry().with(filter);

    if log_json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

/// Pick the filter directive: an explicit `--log-level` first, then
/// `PATHGRAPH_LOG`, then `RUST_LOG`, then `info`. A bare level such as
/// `debug` is scoped to the library and binary.
pub fn filter_directive<E>(log_level: Option<&str>, env: E) -> String
where
    E: Fn(&str) -> Option<String>,
{
    let chosen = log_level
        .map(str::to_string)
        .or_else(|| env("PATHGRAPH_LOG"))
        .or_else(|| env("RUST_LOG"))
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| "info".to_string());
    directive_for(chosen.trim())
}

fn directive_for(level: &str) -> String {
    if level.contains('=') || level.contains(',') {
        level.to_string()
    } else {
        format!("pathgraph_core={0},pathgraph={0}", level)
    }
}
