use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use uuid::Uuid;

use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;
use shared_utils::extractor::require_staff;

use crate::models::{CreatePrescriptionRequest, PrescriptionError, PrescriptionSearchQuery};
use crate::services::PrescriptionService;

fn map_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<PrescriptionError>() {
        Some(PrescriptionError::NotFound) => AppError::NotFound(e.to_string()),
        Some(PrescriptionError::ValidationError(_)) => AppError::ValidationError(e.to_string()),
        None => AppError::Database(e.to_string()),
    }
}

async fn caller_patient_id(config: &AppConfig, user: &User, token: &str) -> Result<Uuid, AppError> {
    PatientService::new(config)
        .get_patient_by_user(&user.id, token)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .map(|p| p.id)
        .ok_or_else(|| AppError::Forbidden("No patient profile linked to this account".to_string()))
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreatePrescriptionRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = PrescriptionService::new(&config);
    let prescription = service.create_prescription(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(prescription)))
}

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<PrescriptionSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        query.patient_id = Some(caller_patient_id(&config, &user, auth.token()).await?);
    }

    let service = PrescriptionService::new(&config);
    let prescriptions = service.search_prescriptions(&query, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "prescriptions": prescriptions,
        "total": prescriptions.len()
    })))
}

#[axum::debug_handler]
pub async fn get_prescription(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(prescription_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = PrescriptionService::new(&config);
    let prescription = service.get_prescription(&prescription_id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Prescription not found".to_string()))?;

    if !user.is_staff() && prescription.patient_id != caller_patient_id(&config, &user, auth.token()).await? {
        return Err(AppError::Forbidden("Not allowed to view this prescription".to_string()));
    }

    Ok(Json(json!(prescription)))
}
