//! Argus CLI entry point.

use clap::Parser;

use argus::cli::{handle_error, Cli, Commands};
use argus::infrastructure::config::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let logging_config = ConfigLoader::load()
        .map(|config| config.logging)
        .unwrap_or_default();
    let _guard = match argus::infrastructure::logging::init(&logging_config) {
        Ok(guard) => guard,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => argus::cli::commands::init::execute(args, cli.json).await,
        Commands::Cluster(args) => argus::cli::commands::cluster::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
