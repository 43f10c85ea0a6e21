use anyhow::Result;
use serde_json::json;
use tracing::{debug, info};
use chrono::Utc;

use shared_config::AppConfig;
use shared_database::supabase::{filter, SupabaseClient};

use crate::models::{Doctor, DoctorSearchFilters, CreateDoctorRequest, DoctorError};

const TABLE: &str = "doctors";
const TITLES: [&str; 3] = ["doctor ", "dr.", "dr "];

/// Drops a spoken title in any case: "Dr. Murphy", "DR MURPHY", "doctor murphy".
fn strip_title(name: &str) -> &str {
    let name = name.trim();
    for title in TITLES {
        if name.get(..title.len()).is_some_and(|head| head.eq_ignore_ascii_case(title)) {
            return name[title.len()..].trim();
        }
    }
    name
}

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_doctor(
        &self,
        request: CreateDoctorRequest,
        auth_token: &str,
    ) -> Result<Doctor> {
        debug!("Creating new doctor profile for: {}", request.email);

        if request.full_name.trim().is_empty() || request.specialty.trim().is_empty() {
            return Err(DoctorError::ValidationError("Name and specialty are required".to_string()).into());
        }

        let email = request.email.trim().to_lowercase();
        let existing: Option<Doctor> = self.supabase
            .select_one(TABLE, &filter("email", "eq", &email), auth_token)
            .await?;
        if existing.is_some() {
            return Err(DoctorError::EmailAlreadyExists { email }.into());
        }

        let doctor_data = json!({
            "user_id": request.user_id,
            "full_name": request.full_name.trim(),
            "email": email,
            "specialty": request.specialty.trim(),
            "phone_number": request.phone_number,
            "bio": request.bio,
            "is_available": true,
            "created_at": Utc::now().to_rfc3339()
        });

        let doctor: Doctor = self.supabase.insert(TABLE, doctor_data, auth_token).await?;
        info!("Doctor profile created with ID: {}", doctor.id);

        Ok(doctor)
    }

    pub async fn get_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Option<Doctor>> {
        debug!("Fetching doctor: {}", doctor_id);
        self.supabase.select_one(TABLE, &filter("id", "eq", doctor_id), auth_token).await
    }

    pub async fn search_doctors(
        &self,
        filters: &DoctorSearchFilters,
        auth_token: &str,
    ) -> Result<Vec<Doctor>> {
        debug!("Searching doctors with filters: {:?}", filters);

        let mut query_parts = vec![];

        if let Some(specialty) = filters.specialty.as_deref().filter(|s| !s.is_empty()) {
            query_parts.push(filter("specialty", "ilike", &format!("*{}*", specialty)));
        }
        if let Some(name) = filters.name.as_deref().filter(|n| !n.is_empty()) {
            query_parts.push(filter("full_name", "ilike", &format!("*{}*", name)));
        }
        if filters.available_only.unwrap_or(false) {
            query_parts.push("is_available=eq.true".to_string());
        }
        query_parts.push("order=full_name.asc".to_string());
        query_parts.push(format!("limit={}", filters.limit.unwrap_or(50).clamp(1, 200)));

        self.supabase.select(TABLE, &query_parts.join("&"), auth_token).await
    }

    /// Best match for a spoken doctor name. A leading "Dr." is ignored.
    pub async fn find_by_name(&self, name: &str, auth_token: &str) -> Result<Option<Doctor>> {
        let filters = DoctorSearchFilters {
            name: Some(strip_title(name).to_string()),
            limit: Some(1),
            ..Default::default()
        };

        Ok(self.search_doctors(&filters, auth_token).await?.into_iter().next())
    }
}
