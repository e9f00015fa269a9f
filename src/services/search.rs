use crate::error::Result;
use crate::models::SearchResultItem;
use crate::services::sentence_encoder::SentenceEncoder;
use crate::services::vector_index::{QueryMatch, VectorIndexClient};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Nearest-neighbour search capability as the pipeline sees it.
///
/// Postconditions: results are ordered by ascending score (best match
/// first); when `max_score` is given every returned score is at or below it;
/// an empty result set is a valid outcome, not an error. `k` bounds the raw
/// candidates requested from the index before threshold filtering, so the
/// effective output size may be smaller.
#[async_trait]
pub trait SimilaritySearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        k: usize,
        max_score: Option<f32>,
    ) -> Result<Vec<SearchResultItem>>;
}

/// Live implementation: embeds the query text, asks the external index for
/// the nearest neighbours, and converts matches into denormalized items.
pub struct ProductSearch {
    encoder: SentenceEncoder,
    index: VectorIndexClient,
}

impl ProductSearch {
    pub fn new(encoder: SentenceEncoder, index: VectorIndexClient) -> Self {
        Self { encoder, index }
    }
}

#[async_trait]
impl SimilaritySearch for ProductSearch {
    async fn search(
        &self,
        query: &str,
        k: usize,
        max_score: Option<f32>,
    ) -> Result<Vec<SearchResultItem>> {
        debug!("Encoding search query: '{}'", query);
        let embedding = self.encoder.encode(query).await?;

        let matches = self.index.query(&embedding, k).await?;
        let results = postprocess(matches, max_score);
        info!(
            "Search for '{}' returned {} of {} requested candidates",
            query,
            results.len(),
            k
        );
        Ok(results)
    }
}

/// Convert raw index matches into items, enforce ascending-score order and
/// apply the optional score ceiling.
pub(crate) fn postprocess(
    matches: Vec<QueryMatch>,
    max_score: Option<f32>,
) -> Vec<SearchResultItem> {
    let mut results: Vec<SearchResultItem> = matches.into_iter().map(item_from_match).collect();

    results.sort_by(|a, b| a.score.partial_cmp(&b.score).unwrap_or(std::cmp::Ordering::Equal));

    if let Some(threshold) = max_score {
        results.retain(|item| item.score <= threshold);
    }

    results
}

fn item_from_match(m: QueryMatch) -> SearchResultItem {
    let mut fields: BTreeMap<String, Value> = BTreeMap::new();
    let mut content = String::new();
    let mut chunk_index = None;
    let mut total_chunks = None;

    if let Some(Value::Object(metadata)) = m.metadata {
        for (key, value) in metadata {
            match key.as_str() {
                "content" => {
                    if let Value::String(text) = value {
                        content = text;
                    }
                }
                "chunk_index" => chunk_index = value.as_u64().map(|v| v as usize),
                "total_chunks" => total_chunks = value.as_u64().map(|v| v as usize),
                _ => {
                    fields.insert(key, value);
                }
            }
        }
    }

    // The match id stands in when the catalog entry carried no identifier.
    fields
        .entry("id".to_string())
        .or_insert_with(|| Value::String(m.id));

    SearchResultItem {
        content,
        score: m.score,
        chunk_index,
        total_chunks,
        fields,
    }
}
