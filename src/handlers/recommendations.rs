use crate::{
    config::Config,
    error::ApiError,
    models::{RecommendationRequest, RecommendationResponse, SearchResponse},
    services::{RecommendationPipeline, SimilaritySearch},
};
use actix_web::{
    web::{self, Json, Query},
    HttpResponse,
};
use serde::Deserialize;

pub fn recommendations_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/recommendations").route(web::post().to(get_recommendations)))
        .service(web::resource("/recommendations/search").route(web::get().to(search_products)));
}

/// Get product recommendations for a natural-language query. The pipeline
/// handles intent analysis (when enabled), search, refinement, explanation
/// and formatting; this layer only validates input and applies the client's
/// optional `max_results` cap on top of the pipeline's own limit.
pub async fn get_recommendations(
    request: Json<RecommendationRequest>,
    pipeline: web::Data<RecommendationPipeline>,
) -> Result<HttpResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::InvalidInput("Query cannot be empty".to_string()));
    }

    let outcome = pipeline.recommend(&request.query).await?;

    let mut recommendations = outcome.recommendations;
    if let Some(max_results) = request.max_results {
        recommendations.truncate(max_results);
    }

    Ok(HttpResponse::Ok().json(RecommendationResponse {
        query: outcome.query,
        total_results: recommendations.len(),
        recommendations,
        explanation: outcome.explanation,
        intent: outcome.intent,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: String,
    k: Option<usize>,
    max_score: Option<f32>,
}

/// Direct similarity search, bypassing the pipeline.
pub async fn search_products(
    params: Query<SearchParams>,
    search: web::Data<dyn SimilaritySearch>,
    config: web::Data<Config>,
) -> Result<HttpResponse, ApiError> {
    if params.q.trim().is_empty() {
        return Err(ApiError::InvalidInput("Query cannot be empty".to_string()));
    }

    let k = params.k.unwrap_or(config.default_search_k);
    let max_score = params.max_score.or(Some(config.max_similarity_score));

    let results = search.search(&params.q, k, max_score).await?;

    Ok(HttpResponse::Ok().json(SearchResponse {
        query: params.q.clone(),
        count: results.len(),
        results,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::SearchResultItem;
    use crate::services::PipelineOptions;
    use actix_web::{test, App};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    struct StubSearch {
        items: Vec<SearchResultItem>,
    }

    #[async_trait]
    impl SimilaritySearch for StubSearch {
        async fn search(
            &self,
            _query: &str,
            _k: usize,
            max_score: Option<f32>,
        ) -> Result<Vec<SearchResultItem>> {
            Ok(self
                .items
                .iter()
                .filter(|item| max_score.map_or(true, |m| item.score <= m))
                .cloned()
                .collect())
        }
    }

    fn priced_item(name: &str, price: f64, score: f32) -> SearchResultItem {
        let mut fields = BTreeMap::new();
        fields.insert("name".to_string(), json!(name));
        fields.insert("price".to_string(), json!(price));
        SearchResultItem {
            content: format!("{} description", name),
            score,
            chunk_index: None,
            total_chunks: None,
            fields,
        }
    }

    fn stub_pipeline(items: Vec<SearchResultItem>) -> web::Data<RecommendationPipeline> {
        let search: Arc<dyn SimilaritySearch> = Arc::new(StubSearch { items });
        web::Data::new(
            RecommendationPipeline::new(search, None, PipelineOptions::reduced()).unwrap(),
        )
    }

    #[actix_web::test]
    async fn empty_query_is_rejected() {
        let app = test::init_service(
            App::new()
                .app_data(stub_pipeline(Vec::new()))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations")
            .set_json(json!({"query": "   "}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn recommendations_round_trip() {
        let items = vec![
            priced_item("Aero Glide", 150.0, 0.4),
            priced_item("Carbon Elite", 300.0, 0.5),
        ];
        let app = test::init_service(
            App::new()
                .app_data(stub_pipeline(items))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations")
            .set_json(json!({"query": "running shoes under $200"}))
            .to_request();
        let body: RecommendationResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.total_results, 1);
        assert_eq!(body.recommendations[0].field("name"), Some(&json!("Aero Glide")));
        assert!(body.explanation.starts_with("Found 1 products"));
        assert!(body.intent.is_none());
    }

    #[actix_web::test]
    async fn max_results_caps_the_response() {
        let items = (0..6)
            .map(|i| priced_item(&format!("p{}", i), 20.0, i as f32 * 0.1))
            .collect();
        let app = test::init_service(
            App::new()
                .app_data(stub_pipeline(items))
                .configure(recommendations_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/recommendations")
            .set_json(json!({"query": "widgets", "max_results": 2}))
            .to_request();
        let body: RecommendationResponse = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body.recommendations.len(), 2);
        assert_eq!(body.total_results, 2);
    }

    #[actix_web::test]
    async fn direct_search_uses_configured_defaults() {
        let items = vec![priced_item("close", 10.0, 0.5), priced_item("far", 10.0, 2.0)];
        let search: Arc<dyn SimilaritySearch> = Arc::new(StubSearch { items });
        let config = Config::load().unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::from(search))
                .app_data(web::Data::new(config))
                .configure(recommendations_config),
        )
        .await;

        // The default max_similarity_score (1.3) filters the distant item.
        let req = test::TestRequest::get()
            .uri("/recommendations/search?q=widgets")
            .to_request();
        let body: SearchResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.count, 1);
        assert_eq!(body.results[0].field("name"), Some(&json!("close")));
    }
}
