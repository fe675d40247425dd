//! mirror: drives a permission-gated mirroring session from the command line.
//!
//! `derive` evaluates the presentation derivation on a facts snapshot,
//! `simulate` replays a scripted session against the in-memory host.

use anyhow::Context;
use clap::Parser;

use mirror_core::config::MirrorConfig;

mod cli;
mod cmd_derive;
mod cmd_simulate;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    let filter = std::env::var("MIRROR_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => MirrorConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => MirrorConfig::default(),
    };

    match args.command {
        cli::Command::Derive(opts) => {
            cmd_derive::cmd_derive(&config, opts.facts.as_deref())?;
        }
        cli::Command::Simulate(opts) => {
            cmd_simulate::cmd_simulate(config, &opts.script, opts.json).await?;
        }
        cli::Command::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
