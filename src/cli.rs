//! Command-line interface definition for LAIM
//!
//! This module defines the CLI structure using clap's derive API,
//! providing the `serve` command for the web front-end and `models`
//! commands for managing models on the inference server.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// LAIM - local front-end for a local LLM inference server
///
/// Proxies generate/chat requests to the inference server, streams the
/// output to the browser and keeps conversation history in SQLite.
#[derive(Parser, Debug, Clone)]
#[command(name = "laim")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Override the inference server base URL
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for LAIM
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Interface to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// SQLite database path for conversation history
        #[arg(long)]
        db_path: Option<PathBuf>,
    },

    /// Manage models on the inference server
    Models {
        /// Model management subcommand
        #[command(subcommand)]
        command: ModelCommand,
    },
}

/// Model management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ModelCommand {
    /// List installed models
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Download a model, printing progress records as they arrive
    Pull {
        /// Model name, e.g. `mistral` or `llama2:13b`
        name: String,
    },

    /// Delete an installed model
    Delete {
        /// Model name
        name: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
