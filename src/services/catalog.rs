use crate::error::{ApiError, Result};
use crate::services::sentence_encoder::SentenceEncoder;
use crate::services::vector_index::{Document, VectorIndexClient};
use futures::future::BoxFuture;
use serde_json::{Map, Value};
use std::path::Path;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

const CHUNK_SIZE: usize = 500;
const CHUNK_OVERLAP: usize = 50;
const BATCH_SIZE: usize = 25;

/// Loads a product catalog from JSON and feeds it into the vector index as
/// embedded documents. Runs at setup time, not during recommendation
/// serving; the index is read-only for the pipeline.
pub struct CatalogIndexer {
    encoder: SentenceEncoder,
    index: VectorIndexClient,
}

impl CatalogIndexer {
    pub fn new(encoder: SentenceEncoder, index: VectorIndexClient) -> Self {
        Self { encoder, index }
    }

    /// Index every product in the given JSON file. Returns the number of
    /// chunks upserted.
    pub async fn index_products(&self, path: &Path) -> Result<usize> {
        info!("Loading product catalog from {}", path.display());
        let products = load_products(path)?;
        if products.is_empty() {
            warn!("Product catalog is empty, nothing to index");
            return Ok(0);
        }

        let documents = build_documents(&products);
        info!(
            "Prepared {} chunks from {} products",
            documents.len(),
            products.len()
        );

        let total_batches = documents.len().div_ceil(BATCH_SIZE);
        let mut indexed = 0;

        for (batch_index, batch) in documents.chunks(BATCH_SIZE).enumerate() {
            let texts: Vec<String> = batch
                .iter()
                .map(|(_, _, content)| content.clone())
                .collect();

            let embeddings = match self.encoder.encode_batch(&texts).await {
                Ok(embeddings) => embeddings,
                Err(e) => {
                    error!(
                        "Failed to embed batch {} of {}: {}",
                        batch_index + 1,
                        total_batches,
                        e
                    );
                    return Err(e);
                }
            };

            if embeddings.len() != batch.len() {
                return Err(ApiError::ExternalServiceError(format!(
                    "Embedding service returned {} vectors for {} inputs",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let vectors: Vec<Document> = batch
                .iter()
                .zip(embeddings)
                .map(|((id, metadata, _), values)| Document {
                    id: id.clone(),
                    values,
                    metadata: Value::Object(metadata.clone()),
                })
                .collect();

            retry_with_backoff(|| Box::pin(self.index.upsert(vectors.clone())), 3, 1000).await?;
            indexed += batch.len();
            info!(
                "Indexed batch {} of {} ({} chunks)",
                batch_index + 1,
                total_batches,
                batch.len()
            );

            if batch_index + 1 < total_batches {
                sleep(Duration::from_millis(500)).await;
            }
        }

        info!("Indexing complete: {} chunks", indexed);
        Ok(indexed)
    }
}

fn load_products(path: &Path) -> Result<Vec<Map<String, Value>>> {
    let raw = std::fs::read_to_string(path)?;
    let products: Vec<Map<String, Value>> = serde_json::from_str(&raw)?;
    Ok(products)
}

/// `(id, metadata, content)` triples ready for embedding. Long content is
/// split into overlapping chunks; every chunk carries the full flattened
/// metadata plus its provenance.
type PreparedDocument = (String, Map<String, Value>, String);

fn build_documents(products: &[Map<String, Value>]) -> Vec<PreparedDocument> {
    let mut documents = Vec::new();

    for product in products {
        let flattened = flatten_product(product);
        let content = searchable_content(&flattened);
        let chunks = chunk_content(&content, CHUNK_SIZE, CHUNK_OVERLAP);
        let total_chunks = chunks.len();
        let base_id = product_id(&flattened);

        for (chunk_index, chunk) in chunks.into_iter().enumerate() {
            let mut metadata = flattened.clone();
            metadata.insert("content".to_string(), Value::String(chunk.clone()));
            metadata.insert("chunk_index".to_string(), Value::from(chunk_index));
            metadata.insert("total_chunks".to_string(), Value::from(total_chunks));

            documents.push((format!("{}-{}", base_id, chunk_index), metadata, chunk));
        }
    }

    documents
}

/// Copy all product fields, hoisting the nested `attributes` object inline
/// with the rest so search results carry one flat mapping.
fn flatten_product(product: &Map<String, Value>) -> Map<String, Value> {
    let mut flattened = Map::new();

    for (key, value) in product {
        if key == "attributes" {
            if let Value::Object(attributes) = value {
                for (attr_key, attr_value) in attributes {
                    flattened.insert(attr_key.clone(), attr_value.clone());
                }
            }
        } else {
            flattened.insert(key.clone(), value.clone());
        }
    }

    flattened
}

/// Text handed to the embedding model: the description enriched with the
/// fields that matter for semantic matching.
fn searchable_content(product: &Map<String, Value>) -> String {
    let mut content = product
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    if let Some(category) = product.get("category").and_then(Value::as_str) {
        content.push_str(&format!(" | Category: {}", category));
    }
    if let Some(brand) = product.get("brand").and_then(Value::as_str) {
        content.push_str(&format!(" | Brand: {}", brand));
    }
    if let Some(use_case) = product.get("use_case").and_then(Value::as_str) {
        content.push_str(&format!(" | Use case: {}", use_case));
    }

    content
}

/// Split content into character windows of `size` with `overlap` characters
/// of context carried between adjacent chunks.
fn chunk_content(content: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    if chars.len() <= size {
        return vec![content.to_string()];
    }

    let step = size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn product_id(product: &Map<String, Value>) -> String {
    if let Some(id) = product.get("id") {
        match id {
            Value::String(s) if !s.is_empty() => return s.clone(),
            Value::Number(n) => return n.to_string(),
            _ => {}
        }
    }

    // Fall back to a slug of the product name.
    product
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == ' ')
        .collect::<String>()
        .to_lowercase()
        .replace(' ', "-")
}

async fn retry_with_backoff<'a, F>(operation: F, max_retries: u32, base_delay_ms: u64) -> Result<()>
where
    F: Fn() -> BoxFuture<'a, Result<()>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(()) => return Ok(()),
            Err(e) => {
                attempt += 1;
                if attempt >= max_retries {
                    return Err(ApiError::ExternalServiceError(format!(
                        "Operation failed after {} attempts: {}",
                        max_retries, e
                    )));
                }
                let delay = base_delay_ms * 2u64.pow(attempt - 1);
                error!("Attempt {} failed, retrying in {}ms: {}", attempt, delay, e);
                sleep(Duration::from_millis(delay)).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn product(raw: Value) -> Map<String, Value> {
        match raw {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn attributes_are_flattened_inline() {
        let flattened = flatten_product(&product(json!({
            "id": "p1",
            "name": "Espresso Pro",
            "price": 249.0,
            "attributes": {"brand": "Brewster", "use_case": "home espresso"}
        })));

        assert_eq!(flattened.get("brand"), Some(&json!("Brewster")));
        assert_eq!(flattened.get("use_case"), Some(&json!("home espresso")));
        assert!(flattened.get("attributes").is_none());
        assert_eq!(flattened.get("price"), Some(&json!(249.0)));
    }

    #[test]
    fn searchable_content_includes_semantic_fields() {
        let flattened = flatten_product(&product(json!({
            "description": "Compact espresso machine",
            "category": "Kitchen",
            "attributes": {"brand": "Brewster", "use_case": "home espresso"}
        })));

        assert_eq!(
            searchable_content(&flattened),
            "Compact espresso machine | Category: Kitchen | Brand: Brewster | Use case: home espresso"
        );
    }

    #[test]
    fn short_content_stays_in_one_chunk() {
        let chunks = chunk_content("short description", 500, 50);
        assert_eq!(chunks, vec!["short description".to_string()]);
    }

    #[test]
    fn long_content_is_split_with_overlap() {
        let content = "a".repeat(1200);
        let chunks = chunk_content(&content, 500, 50);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 500);
        assert_eq!(chunks[1].len(), 500);
        // 1200 chars with step 450: last window starts at 900.
        assert_eq!(chunks[2].len(), 300);
    }

    #[test]
    fn documents_carry_chunk_provenance() {
        let products = vec![product(json!({
            "id": "p1",
            "name": "Verbose",
            "description": "x".repeat(900),
        }))];

        let documents = build_documents(&products);
        assert_eq!(documents.len(), 2);

        let (id, metadata, _) = &documents[0];
        assert_eq!(id, "p1-0");
        assert_eq!(metadata.get("chunk_index"), Some(&json!(0)));
        assert_eq!(metadata.get("total_chunks"), Some(&json!(2)));
        assert_eq!(metadata.get("name"), Some(&json!("Verbose")));

        let (id, metadata, _) = &documents[1];
        assert_eq!(id, "p1-1");
        assert_eq!(metadata.get("chunk_index"), Some(&json!(1)));
    }

    #[test]
    fn product_id_falls_back_to_name_slug() {
        let without_id = product(json!({"name": "Steel Water Bottle"}));
        assert_eq!(product_id(&without_id), "steel-water-bottle");

        let numeric_id = product(json!({"id": 42, "name": "whatever"}));
        assert_eq!(product_id(&numeric_id), "42");
    }
}
