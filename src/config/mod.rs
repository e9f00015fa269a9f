use crate::error::Result;
use serde::Deserialize;

/// Application configuration, loaded from environment variables layered over
/// built-in defaults. Every field can be overridden by an env var with the
/// same (uppercased) name.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub api_host: String,
    pub api_port: u16,

    /// Base URL of the external vector index service.
    pub vector_index_url: String,
    pub vector_index_api_key: String,

    /// Hosted embedding inference endpoint and model.
    pub embedding_api_url: String,
    pub embedding_api_key: String,
    pub embedding_model: String,

    /// Completion service used for intent analysis and LLM explanations.
    /// Optional: the reduced pipeline (no intent analysis, deterministic
    /// explanations) runs without one.
    pub openai_api_key: Option<String>,
    pub llm_model: String,
    pub llm_temperature: f32,

    /// Raw candidates requested from the index per query.
    pub default_search_k: usize,
    /// Similarity distance threshold; results scoring above it are dropped.
    pub max_similarity_score: f32,
    /// Default `k` for the direct search endpoint.
    pub default_query_k: usize,

    /// Top N recommendations fed into explanation generation.
    pub max_recommendations_to_explain: usize,
    /// Cap on recommendations returned by the pipeline.
    pub max_recommendations_to_return: usize,

    /// Include the intent-analysis stage (requires a completion model).
    pub analyze_intent: bool,
    /// Use the data-derived explanation variant instead of the LLM one.
    pub deterministic_explanations: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let loader = config::Config::builder()
            .set_default("api_host", "0.0.0.0")?
            .set_default("api_port", 8000)?
            .set_default("vector_index_url", "http://localhost:8080")?
            .set_default("vector_index_api_key", "")?
            .set_default(
                "embedding_api_url",
                "https://api-inference.huggingface.co/models",
            )?
            .set_default("embedding_api_key", "")?
            .set_default(
                "embedding_model",
                "sentence-transformers/multi-qa-MiniLM-L6-cos-v1",
            )?
            .set_default("llm_model", "gpt-4o-mini")?
            .set_default("llm_temperature", 0.7)?
            .set_default("default_search_k", 15)?
            .set_default("max_similarity_score", 1.3)?
            .set_default("default_query_k", 5)?
            .set_default("max_recommendations_to_explain", 3)?
            .set_default("max_recommendations_to_return", 8)?
            .set_default("analyze_intent", true)?
            .set_default("deterministic_explanations", false)?
            .add_source(config::Environment::default())
            .build()?;

        Ok(loader.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_serving_parameters() {
        let config = Config::load().expect("defaults should always load");

        assert_eq!(config.default_search_k, 15);
        assert_eq!(config.max_similarity_score, 1.3);
        assert_eq!(config.max_recommendations_to_return, 8);
        assert_eq!(config.max_recommendations_to_explain, 3);
        assert_eq!(config.llm_model, "gpt-4o-mini");
    }
}
