use serde_json::{json, Value};

use crate::cli::OutputFormat;
use crate::config::{config, AppConfig};
use crate::state::AppState;

/// Builds application state from the loaded configuration
pub async fn load_state() -> anyhow::Result<AppState> {
    let config: AppConfig = config().clone();
    AppState::from_config(config)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialise backend: {}", e))
}

/// Output a success message in the appropriate format
pub fn output_success(output_format: OutputFormat, message: &str, data: Option<Value>) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let mut response = json!({
                "status": "ok",
                "message": message
            });
            if let Some(data_value) = data {
                response["data"] = data_value;
            }
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        OutputFormat::Text => {
            println!("✓ {}", message);
            if let Some(Value::Object(fields)) = data {
                for (key, value) in fields {
                    println!("  {}: {}", key, value);
                }
            }
        }
    }
    Ok(())
}

/// Output a list of problems, one per line in text mode
pub fn output_errors(output_format: OutputFormat, errors: &[String]) {
    if errors.is_empty() || matches!(output_format, OutputFormat::Json) {
        return;
    }
    for error in errors {
        eprintln!("  ✗ {}", error);
    }
}
