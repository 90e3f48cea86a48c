pub mod handlers;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use state::AppState;

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // Checkout initiation
        .route("/api/listings/checkout", post(handlers::payments::create_checkout))
        // Payment confirmation triggers: the provider webhook and the
        // client-side confirm call both land on the reconciler
        .route("/api/payments/webhook/stripe", post(handlers::payments::stripe_webhook))
        .route("/api/payments/confirm", post(handlers::payments::confirm))
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}
