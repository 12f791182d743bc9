//! Photo identification CLI command

use anyhow::{Context, Result};
use std::path::Path;

use crate::client::{ApiClient, IdentifyResponse};
use crate::output::{
    color_confidence, format_bytes, format_duration_ms, print_error, print_info, print_json,
    print_success, OutputFormat,
};

/// Upload a photo and print the identification
pub async fn identify(client: &ApiClient, path: &Path, format: OutputFormat) -> Result<()> {
    let image = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let response = client.identify(&filename, image).await?;

    match format {
        OutputFormat::Json => print_json(&response)?,
        OutputFormat::Table => print_response(&response),
    }

    if !response.success {
        anyhow::bail!(
            "Identification failed: {}",
            response.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}

fn print_response(response: &IdentifyResponse) {
    if let Some(prediction) = &response.prediction {
        let species = &prediction.species_info;
        print_success(&format!(
            "{} ({})",
            species.common_name, prediction.class
        ));
        println!("Confidence:   {}", color_confidence(prediction.confidence));
        println!("Family:       {}", species.family);
        println!("Habitat:      {}", species.habitat);
        println!(
            "Conservation: {}",
            species.conservation_status.as_deref().unwrap_or("Unknown")
        );
        println!("Model:        {}", prediction.model_used);
        println!(
            "Processed in {} at {}",
            format_duration_ms(prediction.processing_time),
            prediction.timestamp.format("%Y-%m-%d %H:%M:%S")
        );
        return;
    }

    print_error(response.error.as_deref().unwrap_or("Identification failed"));
    if let Some(model) = &response.model {
        print_info(&format!("Model: {}", model));
    }
    if let Some(info) = &response.image_info {
        let [width, height] = info.dimensions;
        print_info(&format!(
            "Image: {} {} {}x{}",
            info.format,
            format_bytes(info.size),
            width,
            height
        ));
    }
}
