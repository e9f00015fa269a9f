use crate::error::{ApiError, Result};
use reqwest::{header::HeaderMap, Client};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the external vector index service. The index is
/// read-mostly from the pipeline's point of view; writes only happen during
/// catalog ingestion.
#[derive(Debug, Clone)]
pub struct VectorIndexClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest {
    vector: Vec<f32>,
    top_k: usize,
    include_values: bool,
    include_metadata: bool,
}

/// One nearest-neighbour hit. `score` is a distance: lower means closer.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f32,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    matches: Vec<QueryMatch>,
}

/// An embedded document as stored in the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: Value,
}

#[derive(Debug, Serialize)]
struct UpsertRequest {
    vectors: Vec<Document>,
}

#[derive(Debug, Serialize)]
struct DeleteRequest {
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vector_count: usize,
    #[serde(default)]
    pub namespaces: HashMap<String, NamespaceStats>,
}

#[derive(Debug, Deserialize)]
pub struct NamespaceStats {
    pub vector_count: usize,
}

impl VectorIndexClient {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let mut headers = HeaderMap::new();
        if !api_key.is_empty() {
            headers.insert("Api-Key", api_key.parse().expect("invalid index API key"));
        }
        headers.insert("Accept", "application/json".parse().unwrap());
        headers.insert("Content-Type", "application/json".parse().unwrap());

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Nearest-neighbour query. The index returns matches ordered by
    /// ascending score (closest first).
    pub async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        let request = QueryRequest {
            vector: vector.to_vec(),
            top_k,
            include_values: false,
            include_metadata: true,
        };

        debug!("Querying index for top {} neighbours", top_k);
        let response = self
            .client
            .post(format!("{}/query", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Index query failed: {}",
                error_text
            )));
        }

        let query_response: QueryResponse = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Failed to parse index response: {}", e))
        })?;
        Ok(query_response.matches)
    }

    pub async fn upsert(&self, documents: Vec<Document>) -> Result<()> {
        let request = UpsertRequest { vectors: documents };

        let response = self
            .client
            .post(format!("{}/vectors/upsert", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Index upsert failed: {}",
                error_text
            )));
        }

        Ok(())
    }

    pub async fn delete_vectors(&self, ids: Vec<String>) -> Result<()> {
        let request = DeleteRequest { ids };

        let response = self
            .client
            .post(format!("{}/vectors/delete", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Index delete failed: {}",
                error_text
            )));
        }

        Ok(())
    }

    pub async fn describe_index_stats(&self) -> Result<IndexStats> {
        let response = self
            .client
            .post(format!("{}/describe_index_stats", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Index stats request failed: {}",
                error_text
            )));
        }

        let stats = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Failed to parse index stats: {}", e))
        })?;
        Ok(stats)
    }
}
