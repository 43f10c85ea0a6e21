// libs/appointment-cell/src/services/booking.rs
use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{filter, StoreConflict, SupabaseClient};

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus, CreateAppointmentRequest,
};
use crate::services::lifecycle::AppointmentLifecycleService;

const TABLE: &str = "appointments";

pub struct AppointmentService {
    supabase: SupabaseClient,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        auth_token: &str,
    ) -> Result<Appointment> {
        debug!("Booking appointment for patient {} at {}", request.patient_id, request.appointment_date);

        if request.appointment_date <= Utc::now() {
            return Err(AppointmentError::InvalidTime.into());
        }

        if let Some(doctor_id) = request.doctor_id {
            self.check_slot_free(&doctor_id.to_string(), request.appointment_date, auth_token).await?;
        }

        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "patient_name": request.patient_name,
            "doctor_name": request.doctor_name,
            "appointment_date": request.appointment_date.to_rfc3339(),
            "reason": request.reason,
            "status": AppointmentStatus::Scheduled,
            "source": request.source,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        // A concurrent booking can win the slot between the check and the insert.
        let appointment: Appointment = self.supabase
            .insert(TABLE, appointment_data, auth_token)
            .await
            .map_err(|e| if e.is::<StoreConflict>() {
                AppointmentError::SlotTaken(request.appointment_date).into()
            } else {
                e
            })?;
        info!("Appointment {} booked via {}", appointment.id, appointment.source);

        Ok(appointment)
    }

    /// A doctor cannot hold two active appointments starting at the same instant.
    async fn check_slot_free(
        &self,
        doctor_id: &str,
        start: chrono::DateTime<Utc>,
        auth_token: &str,
    ) -> Result<()> {
        let query = format!(
            "{}&{}&status=in.(scheduled,confirmed)",
            filter("doctor_id", "eq", doctor_id),
            filter("appointment_date", "eq", &start.to_rfc3339()),
        );

        let clashing: Option<Value> = self.supabase.select_one(TABLE, &query, auth_token).await?;
        if clashing.is_some() {
            return Err(AppointmentError::SlotTaken(start).into());
        }
        Ok(())
    }

    pub async fn get_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Option<Appointment>> {
        debug!("Fetching appointment: {}", appointment_id);
        self.supabase.select_one(TABLE, &filter("id", "eq", appointment_id), auth_token).await
    }

    pub async fn search_appointments(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>> {
        debug!("Searching appointments: {:?}", query);

        let mut query_parts = vec![];

        if let Some(patient_id) = query.patient_id {
            query_parts.push(filter("patient_id", "eq", &patient_id.to_string()));
        }
        if let Some(doctor_id) = query.doctor_id {
            query_parts.push(filter("doctor_id", "eq", &doctor_id.to_string()));
        }
        if let Some(status) = query.status {
            query_parts.push(filter("status", "eq", &status.to_string()));
        }
        if query.upcoming_only.unwrap_or(false) {
            query_parts.push(filter("appointment_date", "gte", &Utc::now().to_rfc3339()));
            if query.status.is_none() {
                query_parts.push("status=in.(scheduled,confirmed)".to_string());
            }
        }
        query_parts.push("order=appointment_date.asc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(100).clamp(1, 500)));

        self.supabase.select(TABLE, &query_parts.join("&"), auth_token).await
    }

    pub async fn update_status(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
        notes: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment> {
        let current = self.get_appointment(appointment_id, auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        self.lifecycle.validate_status_transition(current.status, new_status)?;

        let mut update = serde_json::Map::new();
        update.insert("status".to_string(), json!(new_status));
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));
        if let Some(notes) = notes {
            update.insert("notes".to_string(), json!(notes));
        }

        let updated: Appointment = self.supabase
            .update(TABLE, &filter("id", "eq", appointment_id), Value::Object(update), auth_token)
            .await?
            .ok_or(AppointmentError::NotFound)?;

        info!("Appointment {} moved from {} to {}", appointment_id, current.status, new_status);
        Ok(updated)
    }

    pub async fn cancel_appointment(&self, appointment_id: &str, auth_token: &str) -> Result<Appointment> {
        self.update_status(appointment_id, AppointmentStatus::Cancelled, None, auth_token).await
    }
}
