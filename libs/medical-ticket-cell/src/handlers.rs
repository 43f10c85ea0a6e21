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

use crate::models::{CreateTicketRequest, TicketError, TicketSearchQuery, UpdateTicketRequest};
use crate::services::TicketService;

fn map_error(e: anyhow::Error) -> AppError {
    match e.downcast_ref::<TicketError>() {
        Some(TicketError::NotFound) => AppError::NotFound(e.to_string()),
        Some(TicketError::ValidationError(_)) => AppError::ValidationError(e.to_string()),
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
pub async fn create_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateTicketRequest>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() && request.patient_id != caller_patient_id(&config, &user, auth.token()).await? {
        return Err(AppError::Forbidden("Patients can only open tickets for themselves".to_string()));
    }

    let service = TicketService::new(&config);
    let ticket = service.create_ticket(request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(ticket)))
}

#[axum::debug_handler]
pub async fn list_tickets(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Query(mut query): Query<TicketSearchQuery>,
) -> Result<Json<Value>, AppError> {
    if !user.is_staff() {
        query.patient_id = Some(caller_patient_id(&config, &user, auth.token()).await?);
    }

    let service = TicketService::new(&config);
    let tickets = service.search_tickets(&query, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!({
        "tickets": tickets,
        "total": tickets.len()
    })))
}

#[axum::debug_handler]
pub async fn get_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = TicketService::new(&config);
    let ticket = service.get_ticket(&ticket_id, auth.token())
        .await
        .map_err(map_error)?
        .ok_or_else(|| AppError::NotFound("Medical ticket not found".to_string()))?;

    if !user.is_staff() && ticket.patient_id != caller_patient_id(&config, &user, auth.token()).await? {
        return Err(AppError::Forbidden("Not allowed to view this ticket".to_string()));
    }

    Ok(Json(json!(ticket)))
}

#[axum::debug_handler]
pub async fn update_ticket(
    State(config): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Path(ticket_id): Path<String>,
    Json(request): Json<UpdateTicketRequest>,
) -> Result<Json<Value>, AppError> {
    require_staff(&user)?;

    let service = TicketService::new(&config);
    let ticket = service.update_ticket(&ticket_id, request, auth.token())
        .await
        .map_err(map_error)?;

    Ok(Json(json!(ticket)))
}
