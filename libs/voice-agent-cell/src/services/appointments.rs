use anyhow::Result;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tracing::info;

use appointment_cell::{Appointment, AppointmentSearchQuery, BookingSource, CreateAppointmentRequest};
use doctor_cell::{Doctor, DoctorSearchFilters};
use patient_cell::PatientLookup;

use crate::models::{decode_arguments, CancelAppointmentArgs, CreateAppointmentArgs, DoctorQueryArgs, ToolResult, VoiceError};
use crate::services::context::{check_patient_profile, settle, VoiceContext};

const DEFAULT_TIME: &str = "09:00";

/// Dispatches one appointment tool call by function name.
pub async fn route_appointment_function(ctx: &VoiceContext, name: &str, args: Value) -> ToolResult {
    info!("Routing appointment function: {}", name);

    let outcome = match name {
        "createAppointment" => create_appointment(ctx, args).await,
        "checkPatientProfile" => check_patient_profile(ctx, args).await,
        "getAvailableDoctors" => get_available_doctors(ctx, args).await,
        "getPatientAppointments" => get_patient_appointments(ctx, args).await,
        "cancelAppointment" => cancel_appointment(ctx, args).await,
        _ => Err(VoiceError::UnknownFunction(name.to_string()).into()),
    };

    settle(name, outcome)
}

/// RFC 3339, or a calendar date plus `HH:MM` read as UTC.
pub fn parse_appointment_time(date: &str, time: Option<&str>) -> Result<DateTime<Utc>, VoiceError> {
    let date = date.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(date) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| VoiceError::InvalidDate(date.to_string()))?;
    let time = time.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TIME);
    let at = NaiveTime::parse_from_str(time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time, "%H:%M:%S"))
        .map_err(|_| VoiceError::InvalidDate(format!("{} {}", date, time)))?;

    Ok(day.and_time(at).and_utc())
}

pub(crate) fn spoken_time(at: &DateTime<Utc>) -> String {
    at.format("%A, %B %-d at %-I:%M %p").to_string()
}

pub(crate) fn doctor_summary(doctor: &Doctor) -> Value {
    json!({
        "id": doctor.id,
        "name": doctor.full_name,
        "specialty": doctor.specialty,
        "available": doctor.is_available,
    })
}

fn appointment_summary(appointment: &Appointment) -> Value {
    json!({
        "id": appointment.id,
        "date": appointment.appointment_date,
        "doctorName": appointment.doctor_name,
        "reason": appointment.reason,
        "status": appointment.status,
    })
}

async fn resolve_doctor(ctx: &VoiceContext, args: &CreateAppointmentArgs) -> Result<Option<Doctor>> {
    if let Some(doctor_id) = args.doctor_id {
        let doctor = ctx.doctors
            .get_doctor(&doctor_id.to_string(), &ctx.token)
            .await?
            .ok_or_else(|| VoiceError::DoctorNotFound(doctor_id.to_string()))?;
        return Ok(Some(doctor));
    }

    match args.doctor_name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => {
            let doctor = ctx.doctors
                .find_by_name(name, &ctx.token)
                .await?
                .ok_or_else(|| VoiceError::DoctorNotFound(name.to_string()))?;
            Ok(Some(doctor))
        }
        None => Ok(None),
    }
}

async fn create_appointment(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: CreateAppointmentArgs = decode_arguments("createAppointment", args)?;
    let appointment_date = parse_appointment_time(&args.date, args.time.as_deref())?;

    let patient = ctx.require_patient(&args.patient).await?;
    let doctor = resolve_doctor(ctx, &args).await?;

    let request = CreateAppointmentRequest {
        patient_id: patient.id,
        doctor_id: doctor.as_ref().map(|d| d.id),
        patient_name: Some(patient.full_name()),
        doctor_name: doctor.as_ref().map(|d| d.full_name.clone()),
        appointment_date,
        reason: args.reason,
        notes: None,
        source: BookingSource::VoiceAgent,
    };

    let appointment = ctx.appointments.create_appointment(request, &ctx.token).await?;

    let with = appointment.doctor_name
        .as_deref()
        .map(|name| format!(" with {}", name))
        .unwrap_or_default();
    Ok(ToolResult::ok(
        format!(
            "Your appointment{} is booked for {}.",
            with,
            spoken_time(&appointment.appointment_date)
        ),
        appointment_summary(&appointment),
    ))
}

async fn get_available_doctors(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: DoctorQueryArgs = decode_arguments("getAvailableDoctors", args)?;

    let filters = DoctorSearchFilters {
        specialty: args.specialty.clone(),
        available_only: Some(true),
        ..Default::default()
    };
    let doctors = ctx.doctors.search_doctors(&filters, &ctx.token).await?;

    let message = match (doctors.len(), args.specialty.as_deref()) {
        (0, Some(specialty)) => format!("There are no {} doctors available right now.", specialty),
        (0, None) => "There are no doctors available right now.".to_string(),
        (n, _) => {
            let names: Vec<&str> = doctors.iter().map(|d| d.full_name.as_str()).collect();
            format!("{} doctor{} available: {}.", n, if n == 1 { " is" } else { "s are" }, names.join(", "))
        }
    };

    let data: Vec<Value> = doctors.iter().map(doctor_summary).collect();
    Ok(ToolResult::ok(message, json!(data)))
}

async fn get_patient_appointments(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let lookup: PatientLookup = decode_arguments("getPatientAppointments", args)?;
    let patient = ctx.require_patient(&lookup).await?;

    let query = AppointmentSearchQuery {
        patient_id: Some(patient.id),
        upcoming_only: Some(true),
        ..Default::default()
    };
    let appointments = ctx.appointments.search_appointments(&query, &ctx.token).await?;

    let message = match appointments.first() {
        None => "You have no upcoming appointments.".to_string(),
        Some(next) => format!(
            "You have {} upcoming appointment{}. The next one is on {}.",
            appointments.len(),
            if appointments.len() == 1 { "" } else { "s" },
            spoken_time(&next.appointment_date)
        ),
    };

    let data: Vec<Value> = appointments.iter().map(appointment_summary).collect();
    Ok(ToolResult::ok(message, json!(data)))
}

async fn cancel_appointment(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: CancelAppointmentArgs = decode_arguments("cancelAppointment", args)?;

    let appointment = ctx.appointments
        .cancel_appointment(&args.appointment_id.to_string(), &ctx.token)
        .await?;

    Ok(ToolResult::ok(
        format!("Your appointment on {} has been cancelled.", spoken_time(&appointment.appointment_date)),
        appointment_summary(&appointment),
    ))
}
