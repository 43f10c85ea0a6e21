use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prescription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: Option<String>,
    pub medication: String,
    pub dosage: String,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
    pub refills_remaining: i32,
    pub status: PrescriptionStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Prescription {
    /// One line suitable for reading aloud.
    pub fn summary(&self) -> String {
        let mut line = format!("{} {}", self.medication, self.dosage);
        if let Some(frequency) = &self.frequency {
            line.push_str(&format!(", {}", frequency));
        }
        match self.refills_remaining {
            0 => {}
            1 => line.push_str(" (1 refill left)"),
            n => line.push_str(&format!(" ({} refills left)", n)),
        }
        line
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrescriptionStatus {
    Active,
    Completed,
    Cancelled,
}

impl fmt::Display for PrescriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrescriptionStatus::Active => write!(f, "active"),
            PrescriptionStatus::Completed => write!(f, "completed"),
            PrescriptionStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePrescriptionRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_name: Option<String>,
    pub medication: String,
    pub dosage: String,
    pub frequency: Option<String>,
    pub instructions: Option<String>,
    #[serde(default)]
    pub refills: i32,
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreatePrescriptionRequest {
    pub fn validate(&self) -> Result<(), PrescriptionError> {
        if self.medication.trim().is_empty() || self.dosage.trim().is_empty() {
            return Err(PrescriptionError::ValidationError("Medication and dosage are required".to_string()));
        }
        if self.refills < 0 {
            return Err(PrescriptionError::ValidationError("Refills cannot be negative".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrescriptionSearchQuery {
    pub patient_id: Option<Uuid>,
    pub status: Option<PrescriptionStatus>,
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PrescriptionError {
    #[error("Prescription not found")]
    NotFound,

    #[error("Validation error: {0}")]
    ValidationError(String),
}
