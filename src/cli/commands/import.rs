use anyhow::Context;
use std::path::Path;
use uuid::Uuid;

use crate::cli::utils::{load_state, output_errors, output_success};
use crate::cli::OutputFormat;

pub async fn handle(file: &Path, user: Uuid, output_format: OutputFormat) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let filename = file
        .file_name()
        .and_then(|name| name.to_str())
        .context("File name is not valid UTF-8")?;

    let state = load_state().await?;
    let summary = state.transactions.import_file(user, filename, &bytes).await?;

    output_success(
        output_format,
        &format!("Imported {}/{} rows", summary.success, summary.processed),
        Some(serde_json::to_value(&summary)?),
    )?;
    output_errors(output_format, &summary.errors);
    Ok(())
}
