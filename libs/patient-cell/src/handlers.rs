use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_staff;

use crate::models::{CreatePatientRequest, UpdatePatientRequest, PatientSearchQuery, PatientError};
use crate::services::PatientService;

fn map_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<PatientError>() {
        Some(PatientError::NotFound) => AppError::NotFound(e.to_string()),
        Some(PatientError::EmailAlreadyExists { .. }) => AppError::Conflict(e.to_string()),
        Some(PatientError::InvalidDateOfBirth) | Some(PatientError::ValidationError(_)) => {
            AppError::ValidationError(e.to_string())
        }
        None => AppError::Database(e.to_string()),
    }
}

/// Patients may only touch their own row.
fn ensure_access(user: &User, patient_user_id: Option<&str>) -> Result<(), AppError> {
    if user.is_staff() || patient_user_id == Some(user.id.as_str()) {
        Ok(())
    } else {
        Err(AppError::Forbidden("Not allowed to access this patient".to_string()))
    }
}

#[axum::debug_handler]
pub async fn create_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(mut request): Json<CreatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        // Self-registration always links to the caller
        request.user_id = Some(user.id.clone());
    }

    let service = PatientService::new(&config);

    let patient = service.create_patient(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let patient = service.get_patient(&patient_id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    ensure_access(&user, patient.user_id.as_deref())?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn get_patient_profile(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    debug!("Fetching own patient profile for {}", user.id);
    let service = PatientService::new(&config);

    let patient = service.get_patient_by_user(&user.id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("No patient profile for this account".to_string()))?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn update_patient(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdatePatientRequest>,
) -> Result<Json<Value>, AppError> {
    let service = PatientService::new(&config);

    let existing = service.get_patient(&patient_id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;
    ensure_access(&user, existing.user_id.as_deref())?;

    let patient = service.update_patient(&patient_id, request, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Patient not found".to_string()))?;

    Ok(Json(json!(patient)))
}

#[axum::debug_handler]
pub async fn search_patients(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(query): Query<PatientSearchQuery>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;
    let service = PatientService::new(&config);

    let patients = service.search_patients(query, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "patients": patients,
        "total": patients.len()
    })))
}
