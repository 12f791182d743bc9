//! Model management CLI commands

use anyhow::Result;
use tabled::Tabled;

use crate::client::{ApiClient, ModelInfo, ModelStats, ModelsResponse, SwitchRequest, SwitchResponse};
use crate::output::{format_bytes, print_json, print_success, print_warning, OutputFormat};

/// Row for models table
#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Formats")]
    formats: String,
    #[tabled(rename = "Max Size")]
    max_size: String,
    #[tabled(rename = "Threshold")]
    threshold: String,
    #[tabled(rename = "Classes")]
    classes: usize,
    #[tabled(rename = "Active")]
    active: String,
}

impl ModelRow {
    fn new(key: &str, model: &ModelInfo, active: bool) -> Self {
        Self {
            key: key.to_string(),
            name: model.name.clone(),
            kind: model.kind.clone(),
            version: model.version.clone(),
            formats: model.supported_formats.join(", "),
            max_size: format_bytes(model.max_image_size.saturating_mul(1024)),
            threshold: format!("{:.2}", model.confidence_threshold),
            classes: model.classes.len(),
            active: if active { "✓".to_string() } else { String::new() },
        }
    }
}

/// List the models declared in the catalog
pub async fn list_models(client: &ApiClient, active_only: bool, format: OutputFormat) -> Result<()> {
    let mut result: ModelsResponse = client.get("api/models").await?;

    if active_only {
        let active = result.active_model.clone();
        result.models.retain(|key, _| *key == active);
    }

    match format {
        OutputFormat::Json => print_json(&result)?,
        OutputFormat::Table => {
            if result.models.is_empty() {
                print_warning("No models found");
                return Ok(());
            }

            let rows: Vec<ModelRow> = result
                .models
                .iter()
                .map(|(key, model)| ModelRow::new(key, model, *key == result.active_model))
                .collect();

            let table = tabled::Table::new(rows)
                .with(tabled::settings::Style::rounded())
                .to_string();
            println!("{}", table);
            println!(
                "\nActive: {}  Fallback: {}",
                result.active_model, result.stats.fallback_model
            );
        }
    }

    Ok(())
}

/// Switch the active model
pub async fn switch_model(client: &ApiClient, key: &str, format: OutputFormat) -> Result<()> {
    let request = SwitchRequest {
        model_key: key.to_string(),
    };

    let response: SwitchResponse = client.post("api/models", &request).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => {
            print_success(&format!("Active model is now {}", response.active_model));
        }
    }

    Ok(())
}

/// Show statistics for the active model
pub async fn show_stats(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let stats: ModelStats = client.get("api/stats").await?;

    match format {
        OutputFormat::Json => print_json(&stats)?,
        OutputFormat::Table => {
            println!("Active model:         {}", stats.active_model);
            println!("Fallback model:       {}", stats.fallback_model);
            println!("Available models:     {}", stats.available_models);
            println!("Classes:              {}", stats.total_classes);
            println!("Confidence threshold: {:.2}", stats.confidence_threshold);
            println!(
                "Ensemble:             {}",
                if stats.enable_ensemble { "enabled" } else { "disabled" }
            );
        }
    }

    Ok(())
}
