//! Attestation API
//!
//! Read/write HTTP surface over the Attestation Client. The storefront's
//! transparency and product pages call it to display sourcing records.

pub mod handlers;
pub mod models;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use handlers::AppState;
pub use models::{AttestationResponse, SubmitAttestationRequest, SubmitAttestationResponse};

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let shared_state = Arc::new(state);

    Router::new()
        .route("/health", get(handlers::health_handler))
        .route(
            "/api/attestations",
            post(handlers::submit_attestation_handler),
        )
        .route(
            "/api/attestations/{uid}",
            get(handlers::get_attestation_handler),
        )
        .route(
            "/api/recipients/{address}/attestations",
            get(handlers::list_recipient_attestations_handler),
        )
        .with_state(shared_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
