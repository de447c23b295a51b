use anyhow::Context;
use serde_json::json;

use crate::cli::utils::{load_state, output_success};
use crate::cli::OutputFormat;
use crate::database::{migrations, DatabaseManager};

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    let state = load_state().await?;
    let pool = state
        .db_pool
        .as_ref()
        .context("Migrations apply to the Postgres backend only (set BACKEND=postgres)")?;

    let applied = migrations::run(pool).await?;
    DatabaseManager::close(pool).await;

    let message = if applied.is_empty() {
        "Database schema is up to date".to_string()
    } else {
        format!("Applied {} migration(s)", applied.len())
    };
    output_success(output_format, &message, Some(json!({ "applied": applied })))
}
