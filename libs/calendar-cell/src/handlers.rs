use std::sync::Arc;
use axum::{
    extract::{Query, State, Extension},
    Json,
};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{CalendarError, CalendarQuery};
use crate::services::CalendarService;

impl From<CalendarError> for AppError {
    fn from(e: CalendarError) -> Self {
        match e {
            CalendarError::NotConfigured => AppError::Internal(e.to_string()),
            CalendarError::NotConnected => AppError::NotFound(e.to_string()),
            CalendarError::InvalidRange => AppError::BadRequest(e.to_string()),
            CalendarError::Upstream(_) => AppError::ExternalService(e.to_string()),
        }
    }
}

#[axum::debug_handler]
pub async fn list_events(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<Value>, AppError> {
    let service = CalendarService::new(&config)?;
    let events = service.list_events(&user.id, &query).await?;

    Ok(Json(json!({
        "events": events,
        "total": events.len()
    })))
}
