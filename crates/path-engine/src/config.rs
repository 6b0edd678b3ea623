use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Shortest path solver over newline-delimited JSON-RPC
///
/// Flags win over the matching `PATHGRAPH_*` environment variables, which
/// win over defaults.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "pathgraph")]
#[command(version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to listen on for TCP clients
    #[arg(long, env = "PATHGRAPH_ADDR", default_value = DEFAULT_ADDR)]
    pub addr: SocketAddr,

    /// Graph file activated before serving
    #[arg(long = "graph", env = "PATHGRAPH_GRAPH", value_name = "FILE")]
    pub graph_path: Option<PathBuf>,

    /// Serve over stdin/stdout instead of TCP
    #[arg(long)]
    pub stdio: bool,

    /// Longest request line accepted, in bytes
    #[arg(
        long,
        env = "PATHGRAPH_MAX_LINE_BYTES",
        default_value_t = DEFAULT_MAX_LINE_BYTES,
        value_parser = parse_line_limit
    )]
    pub max_line_bytes: usize,

    /// Directory `upload_graph` may read `path` uploads from; unset disables them
    #[arg(long, env = "PATHGRAPH_UPLOAD_DIR", value_name = "DIR")]
    pub upload_dir: Option<PathBuf>,

    /// Log level or filter directive, e.g. `debug` or `pathgraph_core=trace`
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,
}

fn parse_line_limit(s: &str) -> Result<usize, String> {
    match s.parse::<usize>().map_err(|e| e.to_string())? {
        0 => Err("line limit must be at least 1 byte".to_string()),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    const ENV_KEYS: [&str; 4] = [
        "PATHGRAPH_ADDR",
        "PATHGRAPH_GRAPH",
        "PATHGRAPH_MAX_LINE_BYTES",
        "PATHGRAPH_UPLOAD_DIR",
    ];

    // Env-backed fields are checked in one test so parallel tests never
    // observe each other's variables.
    #[test]
    fn test_defaults_env_and_flags() {
        for key in ENV_KEYS {
            env::remove_var(key);
        }
        let config = ServerConfig::try_parse_from(["pathgraph"]).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(config.graph_path, None);
        assert_eq!(config.max_line_bytes, DEFAULT_MAX_LINE_BYTES);
        assert_eq!(config.upload_dir, None);
        assert!(!config.stdio);

        env::set_var("PATHGRAPH_ADDR", "0.0.0.0:9000");
        env::set_var("PATHGRAPH_GRAPH", "/srv/env.json");
        env::set_var("PATHGRAPH_MAX_LINE_BYTES", "1024");
        env::set_var("PATHGRAPH_UPLOAD_DIR", "/srv/graphs");

        let config = ServerConfig::try_parse_from(["pathgraph"]).unwrap();
        assert_eq!(config.addr.port(), 9000);
        assert_eq!(config.graph_path, Some(PathBuf::from("/srv/env.json")));
        assert_eq!(config.max_line_bytes, 1024);
        assert_eq!(config.upload_dir, Some(PathBuf::from("/srv/graphs")));

        let config = ServerConfig::try_parse_from([
            "pathgraph",
            "--addr",
            "127.0.0.1:7000",
            "--graph",
            "cli.json",
            "--max-line-bytes",
            "64",
            "--stdio",
            "--log-json",
        ])
        .unwrap();
        assert_eq!(config.addr.port(), 7000);
        assert_eq!(config.graph_path, Some(PathBuf::from("cli.json")));
        assert_eq!(config.max_line_bytes, 64);
        assert!(config.stdio);
        assert!(config.log_json);

        env::set_var("PATHGRAPH_MAX_LINE_BYTES", "0");
        assert!(ServerConfig::try_parse_from(["pathgraph"]).is_err());

        for key in ENV_KEYS {
            env::remove_var(key);
        }
    }

    #[test]
    fn test_bad_flags() {
        for argv in [
            &["pathgraph", "--addr"][..],
            &["pathgraph", "--addr", "nowhere"],
            &["pathgraph", "--max-line-bytes", "0"],
            &["pathgraph", "--max-line-bytes", "lots"],
            &["pathgraph", "--bogus"],
        ] {
            assert!(ServerConfig::try_parse_from(argv).is_err(), "argv {:?}", argv);
        }
    }

    #[test]
    fn test_line_limit_parser() {
        assert_eq!(parse_line_limit("4096"), Ok(4096));
        assert!(parse_line_limit("0").is_err());
        assert!(parse_line_limit("-1").is_err());
    }

    #[test]
    fn test_help_is_available() {
        let err = ServerConfig::try_parse_from(["pathgraph", "--help"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayHelp);
    }
}
