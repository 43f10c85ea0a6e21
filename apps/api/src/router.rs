use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::appointment_routes;
use auth_cell::auth_routes;
use calendar_cell::calendar_routes;
use doctor_cell::doctor_routes;
use medical_ticket_cell::medical_ticket_routes;
use patient_cell::patient_routes;
use prescription_cell::prescription_routes;
use shared_config::AppConfig;
use voice_agent_cell::voice_routes;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "CareVoice Hospital API is running!" }))
        .nest("/auth", auth_routes(state.clone()))
        .nest("/patients", patient_routes(state.clone()))
        .nest("/doctors", doctor_routes(state.clone()))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/medical-tickets", medical_ticket_routes(state.clone()))
        .nest("/prescriptions", prescription_routes(state.clone()))
        .nest("/calendar", calendar_routes(state.clone()))
        .nest("/voice", voice_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::{Request, StatusCode}};
    use tower::ServiceExt;
    use shared_utils::test_utils::TestConfig;

    #[tokio::test]
    async fn test_liveness() {
        let app = create_router(TestConfig::default().to_arc());
        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_protected_cells_require_token() {
        let app = create_router(TestConfig::default().to_arc());
        for uri in ["/patients/profile", "/appointments", "/medical-tickets", "/prescriptions", "/calendar/events"] {
            let response = app
                .clone()
                .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }

    #[tokio::test]
    async fn test_voice_routes_require_secret() {
        let app = create_router(TestConfig::default().to_arc());
        let request = Request::builder()
            .method("POST")
            .uri("/voice/appointments")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
