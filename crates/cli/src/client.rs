//! API client for communicating with the Flora server

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{multipart, Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// API client for the Flora server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        parse_response(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        parse_response(response).await
    }

    /// Upload an image for identification
    ///
    /// A rejected prediction (422) is returned as a response with
    /// `success: false`, not as an error.
    pub async fn identify(&self, filename: &str, image: Vec<u8>) -> Result<IdentifyResponse> {
        let url = self.base_url.join("api/identify").context("Invalid path")?;

        let part = multipart::Part::bytes(image).file_name(filename.to_string());
        let form = multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return response.json().await.context("Failed to parse response");
        }

        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        anyhow::bail!("API error ({}): {}", status, message);
    }

    response.json().await.context("Failed to parse response")
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "modelPath")]
    pub model_path: String,
    pub confidence_threshold: f32,
    pub supported_formats: Vec<String>,
    /// Kilobytes
    pub max_image_size: u64,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStats {
    pub active_model: String,
    pub available_models: usize,
    pub total_classes: usize,
    pub confidence_threshold: f32,
    #[serde(default)]
    pub fallback_model: String,
    #[serde(default)]
    pub enable_ensemble: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: BTreeMap<String, ModelInfo>,
    pub stats: ModelStats,
    pub active_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchRequest {
    #[serde(rename = "modelKey")]
    pub model_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchResponse {
    pub success: bool,
    pub active_model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeciesInfo {
    pub scientific_name: String,
    pub common_name: String,
    pub family: String,
    pub habitat: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conservation_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub class: String,
    pub confidence: f32,
    pub species_info: SpeciesInfo,
    /// Milliseconds
    pub processing_time: u64,
    pub model_used: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_digest: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub size: u64,
    pub format: String,
    pub dimensions: [u32; 2],
}

/// Body of `POST /api/identify`, for both outcomes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentifyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prediction: Option<Prediction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_info: Option<ImageInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identify_success() {
        let body = r#"{
            "success": true,
            "prediction": {
                "class": "Rhizophora mangle",
                "confidence": 0.87,
                "species_info": {
                    "scientific_name": "Rhizophora mangle",
                    "common_name": "Red Mangrove",
                    "family": "Rhizophoraceae",
                    "habitat": "Coastal wetlands, tidal zones",
                    "conservation_status": "Least Concern"
                },
                "processing_time": 102,
                "model_used": "cv1",
                "timestamp": "2024-05-01T10:00:00Z"
            }
        }"#;

        let response: IdentifyResponse = serde_json::from_str(body).unwrap();
        let prediction = response.prediction.unwrap();
        assert!(response.success);
        assert_eq!(prediction.species_info.common_name, "Red Mangrove");
        assert!(prediction.image_digest.is_none());
    }

    #[test]
    fn test_parse_identify_failure() {
        let body = r#"{
            "success": false,
            "error": "Unsupported image format: gif",
            "model": "cv1",
            "timestamp": "2024-05-01T10:00:00Z",
            "image_info": { "size": 2048, "format": "gif", "dimensions": [0, 0] }
        }"#;

        let response: IdentifyResponse = serde_json::from_str(body).unwrap();
        assert!(!response.success);
        assert!(response.prediction.is_none());
        assert_eq!(response.image_info.unwrap().format, "gif");
    }

    #[test]
    fn test_client_rejects_invalid_url() {
        assert!(ApiClient::new("not a url").is_err());
        assert!(ApiClient::new("http://localhost:8080").is_ok());
    }
}
