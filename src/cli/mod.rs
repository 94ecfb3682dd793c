pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::config::config;
use crate::state::AppState;

#[derive(Parser)]
#[command(name = "opsctl")]
#[command(about = "Operations CLI for the portfolio backend: migrations, users, lineage, billing and the role gate")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply embedded database migrations")]
    Migrate,

    #[command(about = "Dashboard user management")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Print the reconstructed lineage of a stored object")]
    Lineage {
        #[arg(help = "Object path, e.g. optimized/gallery-3f2a-cat-800w.webp")]
        path: String,
    },

    #[command(about = "Billing export helpers")]
    Billing {
        #[command(subcommand)]
        cmd: commands::billing::BillingCommands,
    },

    #[command(about = "Inspect the route role gate")]
    Gate {
        #[command(subcommand)]
        cmd: commands::gate::GateCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Same collaborators the server runs with
pub fn app_state() -> anyhow::Result<AppState> {
    Ok(AppState::from_config(config().clone())?)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::Lineage { path } => commands::lineage::handle(path, output_format).await,
        Commands::Billing { cmd } => commands::billing::handle(cmd, output_format),
        Commands::Gate { cmd } => commands::gate::handle(cmd, output_format),
    }
}
