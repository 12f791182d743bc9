//! Flora CLI
//!
//! A command-line tool for identifying plant photos and managing the
//! models served by the Flora identification service.

mod client;
mod commands;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{identify, models};
use std::path::PathBuf;

/// Flora plant identification CLI
#[derive(Parser)]
#[command(name = "flora")]
#[command(author, version, about = "CLI for the Flora plant identification service", long_about = None)]
pub struct Cli {
    /// API endpoint URL (can also be set via FLORA_API_URL env var)
    #[arg(long, env = "FLORA_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Inspect and switch models
    #[command(subcommand)]
    Models(ModelsCommands),

    /// Show statistics for the active model
    Stats,

    /// Identify the plant in a photo
    Identify {
        /// Path to the image file
        path: PathBuf,
    },
}

#[derive(Subcommand)]
pub enum ModelsCommands {
    /// List configured models
    List {
        /// Show only the active model
        #[arg(long)]
        active_only: bool,
    },

    /// Make another model active
    Switch {
        /// Model key from the catalog
        key: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize client
    let client = client::ApiClient::new(&cli.api_url)?;

    // Execute command
    match cli.command {
        Commands::Models(models_cmd) => match models_cmd {
            ModelsCommands::List { active_only } => {
                models::list_models(&client, active_only, cli.format).await?;
            }
            ModelsCommands::Switch { key } => {
                models::switch_model(&client, &key, cli.format).await?;
            }
        },
        Commands::Stats => {
            models::show_stats(&client, cli.format).await?;
        }
        Commands::Identify { path } => {
            identify::identify(&client, &path, cli.format).await?;
        }
    }

    Ok(())
}
