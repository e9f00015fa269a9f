use crate::error::{ApiError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

/// HTTP client for a hosted sentence-transformers inference endpoint.
/// The pipeline never computes embeddings locally; this is its only path
/// to vector space.
#[derive(Debug, Clone)]
pub struct SentenceEncoder {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct EncodeRequest {
    inputs: Vec<String>,
    options: Options,
}

#[derive(Debug, Serialize)]
struct Options {
    wait_for_model: bool,
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct EncodeResponse(Vec<Vec<f32>>);

impl SentenceEncoder {
    pub fn new(api_url: &str, api_key: &str, model: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.encode_batch(&[text.to_string()]).await?;
        if embeddings.is_empty() {
            return Err(ApiError::ExternalServiceError(
                "Embedding service returned no vectors".to_string(),
            ));
        }
        Ok(embeddings.swap_remove(0))
    }

    pub async fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EncodeRequest {
            inputs: texts.to_vec(),
            options: Options {
                wait_for_model: true,
                use_cache: true,
            },
        };

        let url = format!("{}/{}", self.api_url, self.model);
        debug!("Requesting {} embeddings from {}", texts.len(), url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                ApiError::ExternalServiceError(format!("Embedding request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            error!("Embedding service error: {}", error_text);
            return Err(ApiError::ExternalServiceError(format!(
                "Embedding service error: {}",
                error_text
            )));
        }

        let embeddings: EncodeResponse = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Failed to parse embedding response: {}", e))
        })?;

        Ok(embeddings.0)
    }
}
