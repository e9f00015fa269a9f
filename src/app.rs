use crate::{
    config::Config,
    error::{ApiError, Result},
    routes::{api_routes, root_route},
    services::{
        CompletionModel, OpenAiChat, PipelineOptions, ProductSearch, RecommendationPipeline,
        SentenceEncoder, SimilaritySearch, VectorIndexClient,
    },
};
use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::net::TcpListener;
use std::sync::Arc;

pub struct Application {
    port: u16,
    host: String,
    config: Config,
}

impl Application {
    /// Create a new application instance
    pub fn new(config: &Config) -> Self {
        Self {
            port: config.api_port,
            host: config.api_host.clone(),
            config: config.clone(),
        }
    }

    /// Build and run the server
    pub async fn run(&self) -> Result<()> {
        // Always bind to 0.0.0.0 for container compatibility
        let bind_address = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&bind_address)?;
        info!("Starting server at http://{}:{}", self.host, self.port);

        self.run_with_listener(listener).await
    }

    /// Run the server with a specific TCP listener
    /// This is useful for testing where we want to use a random port
    pub async fn run_with_listener(&self, listener: TcpListener) -> Result<()> {
        // Wire up the external service clients
        let encoder = SentenceEncoder::new(
            &self.config.embedding_api_url,
            &self.config.embedding_api_key,
            &self.config.embedding_model,
        );
        let index = VectorIndexClient::new(
            &self.config.vector_index_url,
            &self.config.vector_index_api_key,
        );
        let search: Arc<dyn SimilaritySearch> = Arc::new(ProductSearch::new(encoder, index));

        let model: Option<Arc<dyn CompletionModel>> =
            self.config.openai_api_key.as_deref().map(|api_key| {
                Arc::new(OpenAiChat::new(
                    api_key,
                    &self.config.llm_model,
                    self.config.llm_temperature,
                )) as Arc<dyn CompletionModel>
            });

        if model.is_none() && (self.config.analyze_intent || !self.config.deterministic_explanations)
        {
            return Err(ApiError::ConfigError(
                "OPENAI_API_KEY is not set; either provide it or run the reduced pipeline \
                 (ANALYZE_INTENT=false, DETERMINISTIC_EXPLANATIONS=true)"
                    .to_string(),
            ));
        }

        // The pipeline is constructed once at startup and handed to request
        // handlers explicitly; there is no global state.
        let pipeline = web::Data::new(RecommendationPipeline::new(
            search.clone(),
            model,
            PipelineOptions::from_config(&self.config),
        )?);
        let search_data: web::Data<dyn SimilaritySearch> = web::Data::from(search);
        let config_data = web::Data::new(self.config.clone());

        info!("Recommendation pipeline initialized");

        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header();

            App::new()
                .wrap(cors)
                .wrap(Logger::default())
                .app_data(pipeline.clone())
                .app_data(search_data.clone())
                .app_data(config_data.clone())
                .service(root_route())
                .service(api_routes())
        })
        .listen(listener)?
        .run()
        .await?;

        Ok(())
    }
}
