//! CLI entry point for wrapgen.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

/// wrapgen — generate managed wrappers from XML API descriptions.
#[derive(Parser, Debug)]
#[command(name = "wrapgen", version, about)]
struct Cli {
    /// Path to the wrapgen.toml configuration file.
    #[arg(default_value = "wrapgen.toml")]
    config: PathBuf,

    /// Output directory (overrides config).
    #[arg(short, long)]
    outdir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("wrapgen=info")),
        )
        .init();

    let cli = Cli::parse();
    wrapgen::run(&cli.config, cli.outdir.as_deref())?;
    Ok(())
}
