// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;
use axum::{
    extract::{Path, Query, State, Extension},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use patient_cell::PatientService;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentSearchQuery, AppointmentStatus, BookingSource, CreateAppointmentRequest,
    UpdateStatusRequest,
};
use crate::services::AppointmentService;

fn map_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<AppointmentError>() {
        Some(AppointmentError::NotFound) => AppError::NotFound(e.to_string()),
        Some(AppointmentError::InvalidTime) | Some(AppointmentError::ValidationError(_)) => {
            AppError::ValidationError(e.to_string())
        }
        Some(AppointmentError::SlotTaken(_)) | Some(AppointmentError::InvalidStatusTransition { .. }) => {
            AppError::Conflict(e.to_string())
        }
        None => AppError::Database(e.to_string()),
    }
}

/// The patient row linked to a non-staff caller.
async fn caller_patient_id(config: &AppConfig, user: &User, token: &str) -> Result<Uuid, AppError> {
    PatientService::new(config)
        .get_patient_by_user(&user.id, token)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .map(|p| p.id)
        .ok_or_else(|| AppError::Forbidden("No patient profile linked to this account".to_string()))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(mut request): Json<CreateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        let own_id = caller_patient_id(&config, &user, auth.token()).await?;
        if request.patient_id != own_id {
            return Err(AppError::Forbidden("Patients can only book for themselves".to_string()));
        }
    }
    request.source = BookingSource::Dashboard;

    let service = AppointmentService::new(&config);
    let appointment = service.create_appointment(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<AppointmentSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        query.patient_id = Some(caller_patient_id(&config, &user, auth.token()).await?);
    }
    debug!("Listing appointments for {:?}", query.patient_id);

    let service = AppointmentService::new(&config);
    let appointments = service.search_appointments(&query, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);
    let appointment = service.get_appointment(&appointment_id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;

    if !user.is_staff() && appointment.patient_id != caller_patient_id(&config, &user, auth.token()).await? {
        return Err(AppError::Forbidden("Not allowed to view this appointment".to_string()));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&config);

    if !user.is_staff() {
        if request.status != AppointmentStatus::Cancelled {
            return Err(AppError::Forbidden("Patients can only cancel appointments".to_string()));
        }
        let appointment = service.get_appointment(&appointment_id, auth.token())
            .await
            .map_err(map_error)?
            .ok_or_else(|| AppError::NotFound("Appointment not found".to_string()))?;
        if appointment.patient_id != caller_patient_id(&config, &user, auth.token()).await? {
            return Err(AppError::Forbidden("Not allowed to change this appointment".to_string()));
        }
    }

    let appointment = service.update_status(&appointment_id, request.status, request.notes, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(appointment)))
}
