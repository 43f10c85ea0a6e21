use anyhow::Result;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use appointment_cell::AppointmentService;
use doctor_cell::DoctorService;
use medical_ticket_cell::TicketService;
use patient_cell::{Patient, PatientLookup, PatientService};
use prescription_cell::PrescriptionService;
use shared_config::AppConfig;

use crate::models::{decode_arguments, ToolResult, VoiceError};

/// Services and credentials shared by every tool call in one webhook request.
pub struct VoiceContext {
    pub patients: PatientService,
    pub doctors: DoctorService,
    pub appointments: AppointmentService,
    pub tickets: TicketService,
    pub prescriptions: PrescriptionService,
    /// Store token; voice calls carry no user session.
    pub token: String,
    pub caller_number: Option<String>,
}

impl VoiceContext {
    pub fn new(config: &AppConfig, caller_number: Option<String>) -> Self {
        Self {
            patients: PatientService::new(config),
            doctors: DoctorService::new(config),
            appointments: AppointmentService::new(config),
            tickets: TicketService::new(config),
            prescriptions: PrescriptionService::new(config),
            token: config.supabase_service_role_key.clone(),
            caller_number,
        }
    }

    /// Falls back to the caller's phone number when the agent gave no identifier.
    pub fn lookup_with_caller(&self, lookup: &PatientLookup) -> Option<PatientLookup> {
        if !lookup.is_empty() {
            return Some(lookup.clone());
        }
        self.caller_number.as_ref().map(|number| PatientLookup {
            phone_number: Some(number.clone()),
            ..Default::default()
        })
    }

    pub async fn find_patient(&self, lookup: &PatientLookup) -> Result<Option<Patient>> {
        let lookup = self.lookup_with_caller(lookup).ok_or(VoiceError::MissingPatientIdentifier)?;
        debug!("Resolving voice caller patient: {:?}", lookup);
        self.patients.find_patient(&lookup, &self.token).await
    }

    pub async fn require_patient(&self, lookup: &PatientLookup) -> Result<Patient> {
        Ok(self.find_patient(lookup).await?.ok_or(VoiceError::PatientNotFound)?)
    }
}

/// Turns a handler outcome into the result read back to the agent.
pub(crate) fn settle(function: &str, outcome: Result<ToolResult>) -> ToolResult {
    match outcome {
        Ok(result) => {
            info!("Voice function {} succeeded", function);
            result
        }
        Err(e) => {
            warn!("Voice function {} failed: {}", function, e);
            ToolResult::failure(e.to_string())
        }
    }
}

/// Shared by the appointment and medical-ticket routers. A miss is not a failure.
pub(crate) async fn check_patient_profile(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let lookup: PatientLookup = decode_arguments("checkPatientProfile", args)?;

    match ctx.find_patient(&lookup).await? {
        Some(patient) => Ok(ToolResult::ok(
            format!("I found a profile for {}.", patient.full_name()),
            json!({
                "exists": true,
                "patientId": patient.id,
                "name": patient.full_name(),
                "allergies": patient.allergies,
            }),
        )),
        None => Ok(ToolResult::ok(
            "I couldn't find a patient profile with those details.",
            json!({ "exists": false }),
        )),
    }
}
