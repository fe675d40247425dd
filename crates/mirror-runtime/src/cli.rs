//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "mirror", about = "permission-gated display mirroring session")]
pub struct Cli {
    /// Session config file (TOML)
    #[arg(long, short = 'c', global = true, env = "MIRROR_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Derive the presentation record from session facts (JSON)
    Derive(DeriveOpts),
    /// Replay a scripted session against the simulated host
    Simulate(SimulateOpts),
    /// Print the effective configuration as TOML
    Config,
}

#[derive(clap::Args)]
pub struct DeriveOpts {
    /// Facts file; reads stdin when omitted
    #[arg(long)]
    pub facts: Option<PathBuf>,
}

#[derive(clap::Args)]
pub struct SimulateOpts {
    /// Script file: `{"host": {...}, "steps": [...]}`
    #[arg(long)]
    pub script: PathBuf,

    /// Emit the full report as JSON
    #[arg(long)]
    pub json: bool,
}
