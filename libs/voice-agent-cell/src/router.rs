use std::sync::Arc;

use axum::{routing::post, Router};

use shared_config::AppConfig;

use crate::handlers;

/// Server-to-server routes; callers authenticate with the shared secret header.
pub fn voice_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/appointments", post(handlers::appointment_webhook))
        .route("/medical-tickets", post(handlers::medical_ticket_webhook))
        .route("/prescriptions", post(handlers::prescription_webhook))
        .with_state(config)
}
