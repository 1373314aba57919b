//! LAIM - Local AI Model front-end
//!
#![doc = "Main entry point for the LAIM server and model management CLI."]

use anyhow::Result;

use laim::cli::{Cli, Commands, ModelCommand};
use laim::commands;
use laim::config::Config;
use laim::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    init_logging(cli.json_logs, cli.verbose)?;

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Serve { .. } => {
            tracing::info!("Starting LAIM server");
            commands::serve::run_serve(config).await?;
            Ok(())
        }
        Commands::Models { command } => {
            tracing::info!("Starting model management command");
            match command {
                ModelCommand::List { json } => {
                    commands::models::list_models(&config, json).await?;
                }
                ModelCommand::Pull { name } => {
                    commands::models::pull_model(&config, &name).await?;
                }
                ModelCommand::Delete { name } => {
                    commands::models::delete_model(&config, &name).await?;
                }
            }
            Ok(())
        }
    }
}
