use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Extension, State, Json},
    http::HeaderMap,
};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::auth::{TokenResponse, User};
use shared_models::error::AppError;
use shared_utils::extractor::bearer_token;
use shared_utils::jwt::validate_token;

use crate::models::AuthEvent;
use crate::services::UserSyncService;
use crate::webhook;

fn extract_bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    Ok(bearer_token(auth_value)?.to_string())
}

pub async fn validate(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Validating token");

    let token = extract_bearer_token(&headers)?;
    let user = validate_token(&token, &config.supabase_jwt_secret).map_err(AppError::Auth)?;

    Ok(Json(TokenResponse {
        valid: true,
        user_id: user.id,
        email: user.email,
        role: user.role,
    }))
}

pub async fn verify(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    debug!("Verifying token");

    let token = extract_bearer_token(&headers)?;
    let valid = validate_token(&token, &config.supabase_jwt_secret).is_ok();

    Ok(Json(json!({ "valid": valid })))
}

pub async fn get_profile(Extension(user): Extension<User>) -> Json<User> {
    Json(user)
}

/// User lifecycle events pushed by the authentication provider.
pub async fn auth_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if config.auth_webhook_secret.is_empty() {
        return Err(AppError::Internal("Auth webhook secret is not configured".to_string()));
    }

    webhook::verify(&headers, &body, &config.auth_webhook_secret).map_err(|e| {
        warn!("Rejected auth webhook: {}", e);
        AppError::BadRequest(e.to_string())
    })?;

    let event: AuthEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid webhook payload: {}", e)))?;
    let event_type = event.event_type.clone();

    let outcome = UserSyncService::new(&config)
        .handle_event(event)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    info!("Auth webhook {} handled: {:?}", event_type, outcome);

    Ok(Json(json!({
        "received": true,
        "type": event_type,
        "outcome": outcome
    })))
}
