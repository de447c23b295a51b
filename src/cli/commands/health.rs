use serde_json::json;

use crate::cli::utils::{load_state, output_success};
use crate::cli::OutputFormat;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state().await?;
    state.store.health_check().await?;

    output_success(
        output_format,
        "Store is reachable",
        Some(json!({
            "backend": state.config.backend.kind,
            "environment": state.config.environment,
        })),
    )
}
