//! FieldOps CLI library.
//!
//! The binary in `main.rs` is a thin shell over these modules so the command
//! logic can be tested without a terminal.

pub mod commands;
pub mod config;
pub mod error;
pub mod seed;
pub mod telemetry;

use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "fieldops")]
#[command(about = "FieldOps CLI - inspect and edit dashboard collections")]
#[command(version)]
pub struct Cli {
    /// Path to the TOML config file
    #[arg(long, env = "FIELDOPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Use a seeded in-memory backend instead of the network
    #[arg(long)]
    pub memory: bool,

    #[command(subcommand)]
    pub command: commands::Command,
}
