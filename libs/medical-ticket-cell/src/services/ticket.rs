use anyhow::Result;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{filter, SupabaseClient};

use crate::models::{
    ticket_number_for, CreateTicketRequest, MedicalTicket, TicketError, TicketSearchQuery, TicketStatus,
    UpdateTicketRequest,
};

const TABLE: &str = "medical_tickets";

pub struct TicketService {
    supabase: SupabaseClient,
}

impl TicketService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    pub async fn create_ticket(
        &self,
        request: CreateTicketRequest,
        auth_token: &str,
    ) -> Result<MedicalTicket> {
        request.validate()?;

        // The id is minted here so the ticket number is known before insert
        let id = Uuid::new_v4();
        let ticket_number = ticket_number_for(&id);
        debug!("Opening medical ticket {} for patient {}", ticket_number, request.patient_id);

        let now = Utc::now().to_rfc3339();
        let ticket_data = json!({
            "id": id,
            "ticket_number": ticket_number,
            "patient_id": request.patient_id,
            "title": request.title.trim(),
            "description": request.description.trim(),
            "priority": request.priority,
            "status": TicketStatus::Open,
            "created_at": now,
            "updated_at": now
        });

        let ticket: MedicalTicket = self.supabase.insert(TABLE, ticket_data, auth_token).await?;
        info!("Medical ticket {} opened with priority {}", ticket.ticket_number, ticket.priority);

        Ok(ticket)
    }

    pub async fn get_ticket(&self, ticket_id: &str, auth_token: &str) -> Result<Option<MedicalTicket>> {
        self.supabase.select_one(TABLE, &filter("id", "eq", ticket_id), auth_token).await
    }

    pub async fn get_ticket_by_number(&self, ticket_number: &str, auth_token: &str) -> Result<Option<MedicalTicket>> {
        let normalized = ticket_number.trim().to_uppercase();
        let normalized = if normalized.starts_with("MT-") {
            normalized
        } else {
            format!("MT-{}", normalized)
        };

        self.supabase.select_one(TABLE, &filter("ticket_number", "eq", &normalized), auth_token).await
    }

    pub async fn search_tickets(
        &self,
        query: &TicketSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<MedicalTicket>> {
        debug!("Searching medical tickets: {:?}", query);

        let mut query_parts = vec![];
        if let Some(patient_id) = query.patient_id {
            query_parts.push(filter("patient_id", "eq", &patient_id.to_string()));
        }
        if let Some(status) = query.status {
            query_parts.push(filter("status", "eq", &status.to_string()));
        }
        if let Some(priority) = query.priority {
            query_parts.push(filter("priority", "eq", &priority.to_string()));
        }
        query_parts.push("order=created_at.desc".to_string());
        query_parts.push(format!("limit={}", query.limit.unwrap_or(50).clamp(1, 200)));

        self.supabase.select(TABLE, &query_parts.join("&"), auth_token).await
    }

    pub async fn update_ticket(
        &self,
        ticket_id: &str,
        request: UpdateTicketRequest,
        auth_token: &str,
    ) -> Result<MedicalTicket> {
        let mut update = serde_json::Map::new();

        if let Some(status) = request.status {
            update.insert("status".to_string(), json!(status));
            if status == TicketStatus::Resolved {
                update.insert("resolved_at".to_string(), json!(Utc::now().to_rfc3339()));
            }
        }
        if let Some(doctor_id) = request.assigned_doctor_id {
            update.insert("assigned_doctor_id".to_string(), json!(doctor_id));
        }
        if let Some(priority) = request.priority {
            update.insert("priority".to_string(), json!(priority));
        }
        if let Some(notes) = request.notes {
            update.insert("notes".to_string(), json!(notes));
        }
        update.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let ticket: MedicalTicket = self.supabase
            .update(TABLE, &filter("id", "eq", ticket_id), Value::Object(update), auth_token)
            .await?
            .ok_or(TicketError::NotFound)?;

        info!("Medical ticket {} updated, status {}", ticket.ticket_number, ticket.status);
        Ok(ticket)
    }
}
