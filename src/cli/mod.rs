//! Command-line interface for the Argus control plane.

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Top-level argument parser.
#[derive(Parser)]
#[command(name = "argus")]
#[command(about = "Argus - Sensor auto-upgrade control plane", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
pub enum Commands {
    /// Initialize Argus configuration and database
    Init(commands::init::InitArgs),

    /// Cluster management commands
    Cluster(commands::cluster::ClusterArgs),
}

/// Print an error in the requested format and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let payload = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string())
        );
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
