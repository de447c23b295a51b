use crate::cli::utils::{load_state, output_success};
use crate::cli::OutputFormat;

pub async fn handle(symbol: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state().await?;
    let refreshed = state.portfolio.refresh_price(symbol).await?;

    if refreshed.updated == 0 {
        tracing::warn!(symbol = %refreshed.symbol, "No security matched the symbol");
    }
    output_success(
        output_format,
        &format!("{} is now {}", refreshed.symbol, refreshed.price),
        Some(serde_json::to_value(&refreshed)?),
    )
}
