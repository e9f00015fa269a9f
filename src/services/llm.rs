use crate::error::{ApiError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Text-completion capability consumed by intent analysis and LLM
/// explanations. A trait so tests can drive the pipeline with canned
/// responses instead of a live service.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Run a completion and coerce the output into `T`. Transport failures
/// surface as `ExternalServiceError`; output that cannot be coerced into the
/// target schema surfaces as `SchemaViolation` — the two are never conflated.
pub async fn complete_structured<T: DeserializeOwned>(
    model: &dyn CompletionModel,
    prompt: &str,
) -> Result<T> {
    let raw = model.complete(prompt).await?;
    let cleaned = strip_code_fences(&raw);
    serde_json::from_str(cleaned)
        .map_err(|e| ApiError::SchemaViolation(format!("{} in completion output: {}", e, cleaned)))
}

/// Models wrap JSON in markdown fences often enough that stripping them is
/// part of the contract.
fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Chat-completions client for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: String,
}

impl OpenAiChat {
    pub fn new(api_key: &str, model: &str, temperature: f32) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_key: api_key.trim().to_string(),
            base_url: OPENAI_API_BASE.to_string(),
            model: model.to_string(),
            temperature,
        }
    }

}

#[async_trait]
impl CompletionModel for OpenAiChat {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };

        debug!("Sending completion request, model={}", self.model);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                ApiError::ExternalServiceError(format!("Completion request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(ApiError::ExternalServiceError(format!(
                "Completion service returned {}: {}",
                status, error_text
            )));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            ApiError::SerializationError(format!("Failed to parse completion response: {}", e))
        })?;

        let answer = parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| {
                ApiError::ExternalServiceError("Completion response had no choices".to_string())
            })?;

        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionModel for Canned {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn fence_stripping_keeps_plain_json() {
        assert_eq!(strip_code_fences(r#"{"a": 1}"#), r#"{"a": 1}"#);
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
    }

    #[tokio::test]
    async fn structured_completion_parses_valid_json() {
        #[derive(Deserialize)]
        struct Out {
            a: i32,
        }

        let out: Out = complete_structured(&Canned(r#"{"a": 3}"#), "ignored")
            .await
            .unwrap();
        assert_eq!(out.a, 3);
    }

    #[tokio::test]
    async fn structured_completion_flags_schema_violations() {
        #[derive(Deserialize, Debug)]
        #[allow(dead_code)]
        struct Out {
            a: i32,
        }

        let err = complete_structured::<Out>(&Canned("not json at all"), "ignored")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::SchemaViolation(_)));
    }
}
