use anyhow::Result;
use serde_json::{json, Value};
use tracing::info;

use medical_ticket_cell::{CreateTicketRequest, MedicalTicket, TicketSearchQuery};
use patient_cell::PatientLookup;

use crate::models::{decode_arguments, CreateTicketArgs, TicketStatusArgs, ToolResult, VoiceError};
use crate::services::context::{check_patient_profile, settle, VoiceContext};

const TITLE_LENGTH: usize = 60;

/// Dispatches one medical-ticket tool call by function name.
pub async fn route_medical_ticket_function(ctx: &VoiceContext, name: &str, args: Value) -> ToolResult {
    info!("Routing medical ticket function: {}", name);

    let outcome = match name {
        "createMedicalTicket" => create_medical_ticket(ctx, args).await,
        "checkPatientProfile" => check_patient_profile(ctx, args).await,
        "getMedicalTickets" => get_medical_tickets(ctx, args).await,
        "getTicketStatus" => get_ticket_status(ctx, args).await,
        _ => Err(VoiceError::UnknownFunction(name.to_string()).into()),
    };

    settle(name, outcome)
}

fn title_from(description: &str) -> String {
    description.trim().chars().take(TITLE_LENGTH).collect()
}

fn ticket_summary(ticket: &MedicalTicket) -> Value {
    json!({
        "id": ticket.id,
        "ticketNumber": ticket.ticket_number,
        "title": ticket.title,
        "status": ticket.status,
        "priority": ticket.priority,
        "createdAt": ticket.created_at,
    })
}

fn spoken_status(ticket: &MedicalTicket) -> String {
    ticket.status.to_string().replace('_', " ")
}

async fn create_medical_ticket(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: CreateTicketArgs = decode_arguments("createMedicalTicket", args)?;
    let patient = ctx.require_patient(&args.patient).await?;

    let title = args.title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| title_from(&args.description));

    let request = CreateTicketRequest {
        patient_id: patient.id,
        title,
        description: args.description,
        priority: args.priority.unwrap_or_default(),
    };
    let ticket = ctx.tickets.create_ticket(request, &ctx.token).await?;

    Ok(ToolResult::ok(
        format!(
            "I've opened medical ticket {}. A member of the care team will follow up.",
            ticket.ticket_number
        ),
        ticket_summary(&ticket),
    ))
}

async fn get_medical_tickets(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let lookup: PatientLookup = decode_arguments("getMedicalTickets", args)?;
    let patient = ctx.require_patient(&lookup).await?;

    let query = TicketSearchQuery {
        patient_id: Some(patient.id),
        ..Default::default()
    };
    let tickets = ctx.tickets.search_tickets(&query, &ctx.token).await?;

    let message = match tickets.len() {
        0 => "You have no medical tickets on file.".to_string(),
        1 => format!("You have one medical ticket, {}, which is {}.", tickets[0].ticket_number, spoken_status(&tickets[0])),
        n => format!("You have {} medical tickets.", n),
    };

    let data: Vec<Value> = tickets.iter().map(ticket_summary).collect();
    Ok(ToolResult::ok(message, json!(data)))
}

async fn get_ticket_status(ctx: &VoiceContext, args: Value) -> Result<ToolResult> {
    let args: TicketStatusArgs = decode_arguments("getTicketStatus", args)?;

    let ticket = if let Some(id) = args.ticket_id {
        ctx.tickets.get_ticket(&id.to_string(), &ctx.token).await?
    } else if let Some(number) = args.ticket_number.as_deref().filter(|n| !n.trim().is_empty()) {
        ctx.tickets.get_ticket_by_number(number, &ctx.token).await?
    } else {
        return Err(VoiceError::InvalidArguments {
            function: "getTicketStatus".to_string(),
            reason: "a ticketNumber or ticketId is required".to_string(),
        }.into());
    };
    let ticket = ticket.ok_or(VoiceError::NotFound("Medical ticket"))?;

    Ok(ToolResult::ok(
        format!("Ticket {} is {}.", ticket.ticket_number, spoken_status(&ticket)),
        ticket_summary(&ticket),
    ))
}
