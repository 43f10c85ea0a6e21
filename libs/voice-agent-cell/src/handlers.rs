use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Json, State},
    http::HeaderMap,
};
use constant_time_eq::constant_time_eq;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{ServerMessage, ToolCallResponse, ToolCallResult, ToolResult, VoiceWebhookRequest};
use crate::services::{
    route_appointment_function, route_medical_ticket_function, route_prescription_function, VoiceContext,
};

pub const SECRET_HEADER: &str = "x-vapi-secret";

/// Which dispatch table a webhook endpoint serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionGroup {
    Appointments,
    MedicalTickets,
    Prescriptions,
}

impl FunctionGroup {
    async fn route(self, ctx: &VoiceContext, name: &str, args: Value) -> ToolResult {
        match self {
            FunctionGroup::Appointments => route_appointment_function(ctx, name, args).await,
            FunctionGroup::MedicalTickets => route_medical_ticket_function(ctx, name, args).await,
            FunctionGroup::Prescriptions => route_prescription_function(ctx, name, args).await,
        }
    }
}

pub fn verify_voice_secret(headers: &HeaderMap, config: &AppConfig) -> Result<(), AppError> {
    if config.voice_webhook_secret.is_empty() {
        warn!("Voice webhook called but no shared secret is configured");
        return Err(AppError::Auth("Voice webhook secret is not configured".to_string()));
    }

    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing voice webhook secret".to_string()))?;

    if !constant_time_eq(provided.as_bytes(), config.voice_webhook_secret.as_bytes()) {
        warn!("Voice webhook secret mismatch");
        return Err(AppError::Auth("Invalid voice webhook secret".to_string()));
    }

    Ok(())
}

async fn handle_message(
    config: &AppConfig,
    headers: &HeaderMap,
    body: &[u8],
    group: FunctionGroup,
) -> Result<Json<Value>, AppError> {
    verify_voice_secret(headers, config)?;

    let request: VoiceWebhookRequest = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid voice webhook payload: {}", e)))?;

    match request.message {
        ServerMessage::ToolCalls { tool_call_list, call } => {
            let caller = call.and_then(|c| c.caller_number());
            let ctx = VoiceContext::new(config, caller);
            info!("{:?} webhook received {} tool call(s)", group, tool_call_list.len());

            let mut results = Vec::with_capacity(tool_call_list.len());
            for tool_call in tool_call_list {
                debug!("Tool call {} requests {}", tool_call.id, tool_call.function.name);
                let result = match tool_call.function.arguments() {
                    Ok(args) => group.route(&ctx, &tool_call.function.name, args).await,
                    Err(e) => ToolResult::failure(e.to_string()),
                };
                results.push(ToolCallResult {
                    tool_call_id: tool_call.id,
                    result: result.to_text(),
                });
            }

            Ok(Json(json!(ToolCallResponse { results })))
        }
        ServerMessage::FunctionCall { function_call, call } => {
            let caller = call.and_then(|c| c.caller_number());
            let ctx = VoiceContext::new(config, caller);

            let result = match function_call.arguments() {
                Ok(args) => group.route(&ctx, &function_call.name, args).await,
                Err(e) => ToolResult::failure(e.to_string()),
            };

            Ok(Json(json!({ "result": result.to_text() })))
        }
        ServerMessage::Other => {
            debug!("{:?} webhook ignored a non-tool message", group);
            Ok(Json(json!({ "received": true })))
        }
    }
}

pub async fn appointment_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle_message(&config, &headers, &body, FunctionGroup::Appointments).await
}

pub async fn medical_ticket_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle_message(&config, &headers, &body, FunctionGroup::MedicalTickets).await
}

pub async fn prescription_webhook(
    State(config): State<Arc<AppConfig>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    handle_message(&config, &headers, &body, FunctionGroup::Prescriptions).await
}
