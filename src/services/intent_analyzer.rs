use crate::error::Result;
use crate::models::Intent;
use crate::services::llm::{complete_structured, CompletionModel};
use std::sync::Arc;
use tracing::debug;

/// Extracts a structured [`Intent`] from the raw query via the completion
/// service. There is no fallback on failure: refinement depends on a
/// well-typed price range, so an unparseable extraction fails the query
/// rather than silently proceeding with a null intent.
pub struct IntentAnalyzer {
    model: Arc<dyn CompletionModel>,
}

impl IntentAnalyzer {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    pub async fn analyze(&self, query: &str) -> Result<Intent> {
        let prompt = build_prompt(query);
        let intent: Intent = complete_structured(self.model.as_ref(), &prompt).await?;
        debug!(
            "Extracted intent: product='{}', kind={:?}",
            intent.product, intent.intent
        );
        Ok(intent)
    }
}

fn build_prompt(query: &str) -> String {
    format!(
        r#"Extract the shopping intent from this query: "{query}"

Respond with ONLY a JSON object, no markdown fences and no prose, matching:
{{
  "intent": "search" | "gift" | "comparison" | "specific_need",
  "product": "<the product being sought, suitable as a similarity-search query>",
  "category": "<product category>" or null,
  "price_range": {{"min": <number or null>, "max": <number or null>}} or null,
  "attributes": {{"<attribute>": "<value>"}} or null,
  "use_case": "<what the product will be used for>" or null
}}

Omit price_range entirely unless the query states a budget."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::models::IntentKind;
    use async_trait::async_trait;

    struct Canned(String);

    #[async_trait]
    impl CompletionModel for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl CompletionModel for Unreachable {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Err(ApiError::ExternalServiceError("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn analyze_parses_well_formed_output() {
        let analyzer = IntentAnalyzer::new(Arc::new(Canned(
            r#"{"intent": "gift", "product": "coffee grinder", "category": "Kitchen",
                "price_range": {"min": null, "max": 80}, "use_case": "espresso at home"}"#
                .to_string(),
        )));

        let intent = analyzer.analyze("birthday gift for a coffee lover").await.unwrap();
        assert_eq!(intent.intent, IntentKind::Gift);
        assert_eq!(intent.product, "coffee grinder");
        assert_eq!(intent.price_range.unwrap().max, Some(80.0));
    }

    #[tokio::test]
    async fn analyze_tolerates_fenced_output() {
        let analyzer = IntentAnalyzer::new(Arc::new(Canned(
            "```json\n{\"intent\": \"search\", \"product\": \"laptop\"}\n```".to_string(),
        )));

        let intent = analyzer.analyze("a laptop").await.unwrap();
        assert_eq!(intent.intent, IntentKind::Search);
        assert!(intent.price_range.is_none());
    }

    #[tokio::test]
    async fn unparseable_output_is_a_schema_violation() {
        let analyzer = IntentAnalyzer::new(Arc::new(Canned(
            "Sure! The user seems to want a laptop.".to_string(),
        )));

        let err = analyzer.analyze("a laptop").await.unwrap_err();
        assert!(matches!(err, ApiError::SchemaViolation(_)));
    }

    #[tokio::test]
    async fn service_failure_propagates_unmodified() {
        let analyzer = IntentAnalyzer::new(Arc::new(Unreachable));
        let err = analyzer.analyze("a laptop").await.unwrap_err();
        assert!(matches!(err, ApiError::ExternalServiceError(_)));
    }
}
