use serde::{Deserialize, Serialize};

pub use intent::{Intent, IntentKind, PriceRange};
pub use product::{as_number, SearchResultItem};

mod intent;
mod product;

/// Request body for product recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationRequest {
    /// The user's free-text query (e.g. "I need a laptop for gaming").
    pub query: String,
    /// Optional client-side cap, applied on top of the pipeline's own limit.
    #[serde(default)]
    pub max_results: Option<usize>,
}

/// Response body for product recommendations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub query: String,
    pub recommendations: Vec<SearchResultItem>,
    pub explanation: String,
    pub total_results: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
}

/// Response body for the direct similarity-search endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResultItem>,
    pub count: usize,
}
