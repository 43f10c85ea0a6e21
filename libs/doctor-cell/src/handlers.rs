use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_role;

use crate::models::{CreateDoctorRequest, DoctorSearchFilters, DoctorError};
use crate::services::DoctorService;

fn map_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<DoctorError>() {
        Some(DoctorError::NotFound) => AppError::NotFound(e.to_string()),
        Some(DoctorError::EmailAlreadyExists { .. }) => AppError::Conflict(e.to_string()),
        Some(DoctorError::ValidationError(_)) => AppError::ValidationError(e.to_string()),
        None => AppError::Database(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn list_doctors(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Query(filters): Query<DoctorSearchFilters>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);

    let doctors = service.search_doctors(&filters, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "doctors": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = DoctorService::new(&config);

    let doctor = service.get_doctor(&doctor_id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Doctor not found".to_string()))?;

    Ok(Json(json!(doctor)))
}

#[axum::debug_handler]
pub async fn create_doctor(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateDoctorRequest>,
) -> Result<Json<Value>, AppError> {
    require_role(&user, &["admin"])?;
    let service = DoctorService::new(&config);

    let doctor = service.create_doctor(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(doctor)))
}
