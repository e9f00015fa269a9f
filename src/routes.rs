use actix_web::{web, HttpResponse, Scope};

use crate::handlers::{health_check, readiness_check, recommendations_config};

/// Configure all routes for the API
pub fn api_routes() -> Scope {
    web::scope("/api")
        .service(health_check)
        .service(readiness_check)
        .configure(recommendations_config)
}

/// Service banner at the root path
pub fn root_route() -> actix_web::Resource {
    web::resource("/").route(web::get().to(|| async {
        HttpResponse::Ok().json(serde_json::json!({
            "message": "Product Recommendation System API",
            "version": env!("CARGO_PKG_VERSION"),
        }))
    }))
}
