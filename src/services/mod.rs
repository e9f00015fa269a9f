pub mod catalog;
pub mod explanation_generator;
pub mod intent_analyzer;
pub mod llm;
pub mod pipeline;
pub mod refinement;
pub mod search;
pub mod sentence_encoder;
pub mod vector_index;

// Re-export public types
pub use catalog::CatalogIndexer;
pub use explanation_generator::ExplanationGenerator;
pub use intent_analyzer::IntentAnalyzer;
pub use llm::{CompletionModel, OpenAiChat};
pub use pipeline::{PipelineOptions, RecommendationOutcome, RecommendationPipeline};
pub use refinement::RefinementFilter;
pub use search::{ProductSearch, SimilaritySearch};
pub use sentence_encoder::SentenceEncoder;
pub use vector_index::VectorIndexClient;
