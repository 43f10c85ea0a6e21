use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;

use doctor_cell::DoctorSearchFilters;
use prescription_cell::{Prescription, PrescriptionSearchQuery, PrescriptionStatus};

use crate::models::{decode_arguments, DoctorQueryArgs, PrescriptionDetailsArgs, PrescriptionListArgs, ToolResult, VoiceError};
use crate::services::appointments::doctor_summary;
use crate::services::context::{settle, VoiceContext};

/// Dispatches one prescription tool call by function name.
pub async fn route_prescription_function(ctx: &VoiceContext, name: &str, args: Value) -> ToolResult {
    info!("Routing prescription function: {}", name);

    let outcome = match name {
        "getPrescriptions" => get_prescriptions(ctx, args).await,
        "getPrescriptionDetails" => get_prescription_details(ctx, args).await,
        "lookupDoctor" => lookup_doctor(ctx, args).await,
        _ => Err(VoiceError::UnknownFunction(name.to_string()).into()),
    };

    settle(name, outcome)
}

fn prescription_summary(prescription: &Prescription) -> Value {
    json!({
        "id": prescription.id,
        "medication": prescription.medication,
        "dosage": prescription.dosage,
        "frequency": prescription.frequency,
        "instructions": prescription.instructions,
        "refillsRemaining": prescription.refills_remaining,
        "status": prescription.status,
        "doctorName": prescription.doctor_name,
        "issuedAt": prescription.issued_at,
    })
}

async fn get_prescriptions(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: PrescriptionListArgs = decode_arguments("getPrescriptions", args)?;
    let patient = ctx.require_patient(&args.patient).await?;

    let active_only = args.active_only.unwrap_or(false);
    let query = PrescriptionSearchQuery {
        patient_id: Some(patient.id),
        status: active_only.then_some(PrescriptionStatus::Active),
        ..Default::default()
    };
    let prescriptions = ctx.prescriptions.search_prescriptions(&query, &ctx.token).await?;

    let kind = if active_only { "active prescription" } else { "prescription" };
    let message = match prescriptions.len() {
        0 => format!("You have no {}s on file.", kind),
        n => {
            let lines: Vec<String> = prescriptions.iter().map(Prescription::summary).collect();
            format!("You have {} {}{}: {}.", n, kind, if n == 1 { "" } else { "s" }, lines.join("; "))
        }
    };

    let data: Vec<Value> = prescriptions.iter().map(prescription_summary).collect();
    Ok(ToolResult::ok(message, json!(data)))
}

async fn get_prescription_details(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: PrescriptionDetailsArgs = decode_arguments("getPrescriptionDetails", args)?;

    let prescription = ctx.prescriptions
        .get_prescription(&args.prescription_id.to_string(), &ctx.token)
        .await?
        .ok_or(VoiceError::NotFound("Prescription"))?;

    let mut message = prescription.summary();
    if let Some(doctor) = &prescription.doctor_name {
        message.push_str(&format!(", prescribed by {}", doctor));
    }
    message.push('.');
    if let Some(instructions) = prescription.instructions.as_deref().filter(|i| !i.trim().is_empty()) {
        message.push_str(&format!(" {}.", instructions.trim_end_matches('.')));
    }

    Ok(ToolResult::ok(message, prescription_summary(&prescription)))
}

async fn lookup_doctor(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: DoctorQueryArgs = decode_arguments("lookupDoctor", args)?;

    if let Some(name) = args.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        let doctor = ctx.doctors
            .find_by_name(name, &ctx.token)
            .await?
            .ok_or_else(|| VoiceError::DoctorNotFound(name.to_string()))?;

        let availability = if doctor.is_available { "is currently available" } else { "is not available right now" };
        return Ok(ToolResult::ok(
            format!("{} works in {} and {}.", doctor.full_name, doctor.specialty, availability),
            doctor_summary(&doctor),
        ));
    }

    let filters = match args.specialty.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(specialty) => DoctorSearchFilters {
            specialty: Some(specialty.to_string()),
            ..Default::default()
        },
        None => DoctorSearchFilters {
            available_only: Some(true),
            ..Default::default()
        },
    };
    let doctors = ctx.doctors.search_doctors(&filters, &ctx.token).await?;

    let message = if doctors.is_empty() {
        "I couldn't find any matching doctors.".to_string()
    } else {
        let names: Vec<&str> = doctors.iter().map(|d| d.full_name.as_str()).collect();
        format!("I found {}: {}.", doctors.len(), names.join(", "))
    };

    let data: Vec<Value> = doctors.iter().map(doctor_summary).collect();
    Ok(ToolResult::ok(message, json!(data)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use shared_utils::test_utils::TestConfig;

    fn context() -> VoiceContext {
        VoiceContext::new(&TestConfig::default().to_app_config(), None)
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let result = route_prescription_function(&context(), "refillEverything", json!({})).await;
        assert_eq!(result, ToolResult::failure("Unknown function: refillEverything"));
    }

    #[tokio::test]
    async fn test_details_require_uuid() {
        let result = route_prescription_function(&context(), "getPrescriptionDetails", json!({"prescriptionId": 42})).await;
        assert!(!result.success);
        assert!(result.message.starts_with("Invalid arguments for getPrescriptionDetails"));
    }

    #[tokio::test]
    async fn test_prescriptions_need_identifier() {
        let result = route_prescription_function(&context(), "getPrescriptions", json!({"activeOnly": true})).await;
        assert_eq!(result.message, VoiceError::MissingPatientIdentifier.to_string());
    }
}
