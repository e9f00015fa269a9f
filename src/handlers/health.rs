use actix_web::{get, HttpResponse};

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

#[get("/health/ready")]
pub async fn readiness_check() -> HttpResponse {
    // The pipeline is constructed before the server binds, so a served
    // request implies readiness.
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ready"
    }))
}
