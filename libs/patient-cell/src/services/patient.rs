use anyhow::{Result, anyhow};
use serde_json::{json, Value};
use tracing::{debug, info};
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::{filter, SupabaseClient};

use crate::models::{
    Patient, CreatePatientRequest, UpdatePatientRequest, PatientSearchQuery, PatientLookup, PatientError,
};

const TABLE: &str = "patients";

/// Stored emails are trimmed and lowercased.
fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub struct PatientService {
    supabase: SupabaseClient,
}

impl PatientService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_patient(
        &self,
        request: CreatePatientRequest,
        auth_token: &str,
    ) -> Result<Patient> {
        debug!("Creating new patient profile for: {}", request.email);
        request.validate()?;
        let email = normalize_email(&request.email);

        let existing: Option<Patient> = self.supabase
            .select_one(TABLE, &filter("email", "eq", &email), auth_token)
            .await?;
        if existing.is_some() {
            return Err(PatientError::EmailAlreadyExists { email }.into());
        }

        let now = Utc::now().to_rfc3339();
        let patient_data = json!({
            "user_id": request.user_id,
            "first_name": request.first_name.trim(),
            "last_name": request.last_name.trim(),
            "email": email,
            "phone_number": request.phone_number,
            "date_of_birth": request.date_of_birth.map(|d| d.format("%Y-%m-%d").to_string()),
            "gender": request.gender,
            "allergies": request.allergies,
            "medical_history": request.medical_history,
            "created_at": now,
            "updated_at": now
        });

        let patient: Patient = self.supabase.insert(TABLE, patient_data, auth_token).await?;
        info!("Patient profile created with ID: {}", patient.id);

        Ok(patient)
    }

    pub async fn get_patient(
        &self,
        patient_id: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        debug!("Fetching patient profile: {}", patient_id);
        self.supabase.select_one(TABLE, &filter("id", "eq", patient_id), auth_token).await
    }

    pub async fn get_patient_by_user(
        &self,
        user_id: &str,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        debug!("Fetching patient profile for user: {}", user_id);
        self.supabase.select_one(TABLE, &filter("user_id", "eq", user_id), auth_token).await
    }

    /// Resolves a patient from whichever identifier the caller supplied.
    pub async fn find_patient(
        &self,
        lookup: &PatientLookup,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        let query = if let Some(id) = lookup.patient_id {
            filter("id", "eq", &id.to_string())
        } else if let Some(email) = lookup.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            filter("email", "eq", &normalize_email(email))
        } else if let Some(phone) = lookup.phone_number.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
            filter("phone_number", "eq", phone)
        } else {
            return Err(anyhow!("A patient id, email or phone number is required"));
        };

        debug!("Looking up patient with {}", query);
        self.supabase.select_one(TABLE, &query, auth_token).await
    }

    pub async fn update_patient(
        &self,
        patient_id: &str,
        request: UpdatePatientRequest,
        auth_token: &str,
    ) -> Result<Option<Patient>> {
        debug!("Updating patient profile: {}", patient_id);

        let mut update_data = serde_json::Map::new();

        if let Some(first_name) = request.first_name {
            update_data.insert("first_name".to_string(), json!(first_name));
        }
        if let Some(last_name) = request.last_name {
            update_data.insert("last_name".to_string(), json!(last_name));
        }
        if let Some(phone_number) = request.phone_number {
            update_data.insert("phone_number".to_string(), json!(phone_number));
        }
        if let Some(date_of_birth) = request.date_of_birth {
            if date_of_birth > Utc::now().date_naive() {
                return Err(PatientError::InvalidDateOfBirth.into());
            }
            update_data.insert("date_of_birth".to_string(), json!(date_of_birth.format("%Y-%m-%d").to_string()));
        }
        if let Some(gender) = request.gender {
            update_data.insert("gender".to_string(), json!(gender));
        }
        if let Some(allergies) = request.allergies {
            update_data.insert("allergies".to_string(), json!(allergies));
        }
        if let Some(medical_history) = request.medical_history {
            update_data.insert("medical_history".to_string(), json!(medical_history));
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        self.supabase
            .update(TABLE, &filter("id", "eq", patient_id), Value::Object(update_data), auth_token)
            .await
    }

    pub async fn search_patients(
        &self,
        query: PatientSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Patient>> {
        debug!("Searching patients with query: {:?}", query);

        let mut query_parts = vec![];

        if let Some(name) = query.name.as_deref().filter(|n| !n.is_empty()) {
            let pattern = urlencoding::encode(&format!("*{}*", name)).into_owned();
            query_parts.push(format!(
                "or=(first_name.ilike.{},last_name.ilike.{})",
                pattern, pattern
            ));
        }
        if let Some(email) = query.email.as_deref().filter(|e| !e.is_empty()) {
            query_parts.push(filter("email", "ilike", &format!("*{}*", email)));
        }
        if let Some(phone) = query.phone.as_deref().filter(|p| !p.is_empty()) {
            query_parts.push(filter("phone_number", "ilike", &format!("*{}*", phone)));
        }

        let limit = query.limit.unwrap_or(50).clamp(1, 200);
        let offset = query.offset.unwrap_or(0).max(0);
        query_parts.push("order=last_name.asc".to_string());
        query_parts.push(format!("limit={}", limit));
        query_parts.push(format!("offset={}", offset));

        self.supabase.select(TABLE, &query_parts.join("&"), auth_token).await
    }
}
