//! CLI definitions for the `chatrelay` binary.
//!
//! Uses clap derive macros. `serve` runs the HTTP relay; `config` and
//! `check` are operator helpers.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Relay browser chat messages to an LLM and stream the replies back.
#[derive(Parser)]
#[command(name = "chatrelay", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file to load instead of `{data_dir}/config.toml`.
    #[arg(short, long, global = true, env = "CHATRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server.
    Serve {
        /// Port to listen on.
        #[arg(short, long, default_value = "3000", env = "CHATRELAY_PORT")]
        port: u16,

        /// Host to bind to.
        #[arg(long, default_value = "127.0.0.1", env = "CHATRELAY_HOST")]
        host: String,

        /// Also export spans through OpenTelemetry (stdout exporter).
        #[arg(long)]
        otel: bool,
    },

    /// Print the effective configuration as TOML.
    Config,

    /// Send a one-off request to the configured provider and report the result.
    Check,
}

impl Cli {
    /// Whether the selected command asked for OpenTelemetry export.
    pub fn wants_otel(&self) -> bool {
        matches!(self.command, Commands::Serve { otel: true, .. })
    }
}
