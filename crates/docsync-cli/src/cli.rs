//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::Parser;
use docsync_broker::{Request, USAGE};

/// docsync - open store documents as ordinary files and keep them in sync
///
/// The first invocation in a directory starts a server that keeps every
/// opened document in sync; later invocations hand their request to it.
#[derive(Parser, Debug)]
#[command(name = "docsync")]
#[command(author, version, about, long_about = None, after_help = USAGE)]
pub struct Cli {
    /// doc:<hex id>, rev:<hex id> or kill; omit to just start the server
    #[arg(value_name = "REQUEST", value_parser = parse_request)]
    pub request: Option<Request>,

    /// Configuration file (default: ./docsync.toml, then the user config dir)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_request(s: &str) -> Result<Request, String> {
    s.parse().map_err(|e| format!("{e}\n\n{USAGE}"))
}
