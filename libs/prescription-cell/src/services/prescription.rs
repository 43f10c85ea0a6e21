use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::{filter, SupabaseClient};

use crate::models::{CreatePrescriptionRequest, Prescription, PrescriptionSearchQuery, PrescriptionStatus};

const TABLE: &str = "prescriptions";

pub struct PrescriptionService {
    supabase: SupabaseClient,
}

impl PrescriptionService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_prescription(
        &self,
        request: CreatePrescriptionRequest,
        auth_token: &str,
    ) -> Result<Prescription> {
        request.validate()?;
        debug!("Issuing {} for patient {}", request.medication, request.patient_id);

        let now = Utc::now().to_rfc3339();
        let data = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "doctor_name": request.doctor_name,
            "medication": request.medication.trim(),
            "dosage": request.dosage.trim(),
            "frequency": request.frequency,
            "instructions": request.instructions,
            "refills_remaining": request.refills,
            "status": PrescriptionStatus::Active,
            "issued_at": now,
            "expires_at": request.expires_at.map(|e| e.to_rfc3339()),
            "created_at": now
        });

        let prescription: Prescription = self.supabase.insert(TABLE, data, auth_token).await?;
        info!("Prescription {} issued by doctor {}", prescription.id, prescription.doctor_id);

        Ok(prescription)
    }

    pub async fn get_prescription(&self, prescription_id: &str, auth_token: &str) -> Result<Option<Prescription>> {
        self.supabase.select_one(TABLE, &filter("id", "eq", prescription_id), auth_token).await
    }

    pub async fn search_prescriptions(
        &self,
        query: &PrescriptionSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Prescription>> {
        debug!("Searching prescriptions: {:?}", query);

        let mut query_parts = vec![];
        if let Some(patient_id) = query.patient_id {
            query_parts.push(filter("patient_id", "eq", &patient_id.to_string()));
        }
        if let Some(status) = query.status {
            query_parts.push(filter("status", "eq", &status.to_string()));
        }
        query_parts.push("order=issued_at.desc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50).clamp(1, 200)));

        self.supabase.select(TABLE, &query_parts.join("&"), auth_token).await
    }
}
