//! docsync CLI
//!
//! Opens store documents as ordinary local files and keeps them in sync.

mod app;
mod cli;
mod config;
mod error;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Settings;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cwd = std::env::current_dir()?;
    let settings =
        Settings::load(cli.config.as_deref(), &cwd)?.with_env(|name| std::env::var(name).ok());
    tracing::debug!(?settings, "Resolved settings");

    app::run(cli.request, settings, &cwd)
}

/// Log to stderr, filtered by `RUST_LOG` when set.
fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,docsync=debug"
    } else {
        "warn,docsync=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let result = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .try_init();
    if let Err(e) = result {
        eprintln!("{}: cannot initialise logging: {}", "warning".yellow().bold(), e);
    }
}
