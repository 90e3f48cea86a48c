use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Venuebook API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Venue listing marketplace payment service",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "checkout": "/api/listings/checkout",
            "confirm": "/api/payments/confirm"
        }
    }))
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
