use clap::Parser;
use std::path::PathBuf;

/// Student-information sidecar: line-delimited JSON requests on stdin,
/// responses on stdout, logs on stderr.
#[derive(Debug, Clone, Parser)]
#[command(name = "rollbookd", version)]
pub struct Config {
    /// Workspace directory to open at startup.
    #[arg(long, env = "ROLLBOOKD_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// tracing filter directive, e.g. `info` or `rollbookd=debug`.
    #[arg(long, env = "ROLLBOOKD_LOG", default_value = "info")]
    pub log_filter: String,
}
