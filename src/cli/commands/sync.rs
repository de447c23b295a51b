use clap::Subcommand;

use crate::cli::utils::{load_state, output_success};
use crate::cli::OutputFormat;
use crate::jobs::Job;

#[derive(Subcommand)]
pub enum SyncCommands {
    #[command(about = "Refresh stock prices from the quote provider")]
    Stocks,

    #[command(about = "Refresh mutual fund NAVs")]
    Nav,
}

pub async fn handle(cmd: SyncCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let job = match cmd {
        SyncCommands::Stocks => Job::StockPrices,
        SyncCommands::Nav => Job::MutualFundNav,
    };

    let state = load_state().await?;
    let stats = state.job_context().run(job).await?;

    output_success(
        output_format,
        &format!("{}: updated {}/{}", job.name(), stats.updated, stats.total),
        Some(serde_json::to_value(&stats)?),
    )
}
