pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "folio")]
#[command(about = "Folio - operator commands for the portfolio tracker backend")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations (Postgres backend)")]
    Migrate,

    #[command(about = "Run a price sync job once")]
    Sync {
        #[command(subcommand)]
        cmd: commands::sync::SyncCommands,
    },

    #[command(about = "Fetch and store the latest quote for one symbol")]
    RefreshPrice {
        #[arg(help = "Ticker symbol, e.g. RELIANCE.BSE")]
        symbol: String,
    },

    #[command(about = "Import transactions from a CSV or Excel file")]
    Import {
        #[arg(help = "Path to a .csv, .xlsx or .xls file")]
        file: PathBuf,
        #[arg(long, help = "Owner of the imported transactions")]
        user: Uuid,
    },

    #[command(about = "Check store connectivity")]
    Health,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
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

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::Sync { cmd } => commands::sync::handle(cmd, output_format).await,
        Commands::RefreshPrice { symbol } => commands::price::handle(&symbol, output_format).await,
        Commands::Import { file, user } => commands::import::handle(&file, user, output_format).await,
        Commands::Health => commands::health::handle(output_format).await,
    }
}
