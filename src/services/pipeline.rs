use crate::config::Config;
use crate::error::{ApiError, Result};
use crate::models::{Intent, SearchResultItem};
use crate::services::explanation_generator::ExplanationGenerator;
use crate::services::intent_analyzer::IntentAnalyzer;
use crate::services::llm::CompletionModel;
use crate::services::refinement::RefinementFilter;
use crate::services::search::SimilaritySearch;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// The single mutable record threaded through one query's processing. Each
/// stage reads what it needs and writes exactly the fields it owns; stages
/// run strictly in sequence.
#[derive(Debug, Clone)]
pub struct PipelineState {
    pub query: String,
    pub intent: Option<Intent>,
    pub search_results: Vec<SearchResultItem>,
    pub recommendations: Vec<SearchResultItem>,
    pub explanation: String,
    pub formatted_response: Option<RecommendationOutcome>,
}

impl PipelineState {
    fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            intent: None,
            search_results: Vec::new(),
            recommendations: Vec::new(),
            explanation: String::new(),
            formatted_response: None,
        }
    }
}

/// Terminal value of a pipeline run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationOutcome {
    pub query: String,
    pub intent: Option<Intent>,
    pub recommendations: Vec<SearchResultItem>,
    pub explanation: String,
}

/// Which stages the pipeline includes and the knobs they run with. One
/// parameterized graph covers both the full (intent-driven) and the reduced
/// (no-LLM) variant.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub analyze_intent: bool,
    pub deterministic_explanations: bool,
    pub search_k: usize,
    pub max_score: Option<f32>,
    pub max_recommendations: usize,
    pub explain_top_n: usize,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            analyze_intent: true,
            deterministic_explanations: false,
            search_k: 15,
            max_score: Some(1.3),
            max_recommendations: 8,
            explain_top_n: 3,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            analyze_intent: config.analyze_intent,
            deterministic_explanations: config.deterministic_explanations,
            search_k: config.default_search_k,
            max_score: Some(config.max_similarity_score),
            max_recommendations: config.max_recommendations_to_return,
            explain_top_n: config.max_recommendations_to_explain,
        }
    }

    /// The reduced variant: no intent analysis, no completion service at
    /// all — regex refinement and data-derived explanations.
    pub fn reduced() -> Self {
        Self {
            analyze_intent: false,
            deterministic_explanations: true,
            ..Self::default()
        }
    }
}

/// Fixed linear sequence over [`PipelineState`]:
/// `[Analyze] → Search → Refine → Explain → Format`. No branching, no
/// retries; adapter errors propagate unmodified to the caller.
pub struct RecommendationPipeline {
    search: Arc<dyn SimilaritySearch>,
    analyzer: Option<IntentAnalyzer>,
    refiner: RefinementFilter,
    explainer: ExplanationGenerator,
    options: PipelineOptions,
}

impl RecommendationPipeline {
    /// Construction fails when the selected stages need a completion model
    /// but none was supplied; a half-configured pipeline never serves.
    pub fn new(
        search: Arc<dyn SimilaritySearch>,
        model: Option<Arc<dyn CompletionModel>>,
        options: PipelineOptions,
    ) -> Result<Self> {
        let analyzer = if options.analyze_intent {
            let model = model.clone().ok_or_else(|| {
                ApiError::ConfigError(
                    "intent analysis is enabled but no completion model is configured".to_string(),
                )
            })?;
            Some(IntentAnalyzer::new(model))
        } else {
            None
        };

        let explainer = if options.deterministic_explanations {
            ExplanationGenerator::deterministic(options.explain_top_n)
        } else {
            let model = model.ok_or_else(|| {
                ApiError::ConfigError(
                    "LLM explanations are enabled but no completion model is configured"
                        .to_string(),
                )
            })?;
            ExplanationGenerator::llm(model, options.explain_top_n)
        };

        Ok(Self {
            search,
            analyzer,
            refiner: RefinementFilter::new(options.max_recommendations),
            explainer,
            options,
        })
    }

    /// Run one query through the pipeline to its terminal state.
    pub async fn recommend(&self, query: &str) -> Result<RecommendationOutcome> {
        let mut state = PipelineState::new(query);

        if let Some(analyzer) = &self.analyzer {
            info!("Analyzing intent...");
            let intent = analyzer.analyze(&state.query).await?;
            debug!("Intent: {:?}", intent);
            state.intent = Some(intent);
        }

        self.search_products(&mut state).await?;
        self.refine(&mut state);
        self.explain(&mut state).await?;
        self.format(&mut state);

        // Should be unreachable given the stage contracts, but the boundary
        // contract is total: emit an empty outcome instead of failing.
        Ok(state.formatted_response.take().unwrap_or_default())
    }

    async fn search_products(&self, state: &mut PipelineState) -> Result<()> {
        let search_query = match &state.intent {
            Some(intent) => intent.search_query(),
            None => state.query.clone(),
        };

        info!("Searching products for '{}'...", search_query);
        state.search_results = self
            .search
            .search(&search_query, self.options.search_k, self.options.max_score)
            .await?;
        info!("Found {} products", state.search_results.len());
        Ok(())
    }

    fn refine(&self, state: &mut PipelineState) {
        info!("Refining results...");
        state.recommendations =
            self.refiner
                .refine(&state.search_results, state.intent.as_ref(), &state.query);
        info!("{} recommendations", state.recommendations.len());
    }

    async fn explain(&self, state: &mut PipelineState) -> Result<()> {
        info!("Generating explanation...");
        state.explanation = self
            .explainer
            .explain(&state.query, &state.recommendations)
            .await?;
        Ok(())
    }

    fn format(&self, state: &mut PipelineState) {
        info!("Formatting response...");
        state.formatted_response = Some(RecommendationOutcome {
            query: state.query.clone(),
            intent: state.intent.clone(),
            recommendations: state.recommendations.clone(),
            explanation: state.explanation.clone(),
        });
    }
}
