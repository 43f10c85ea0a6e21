use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::json;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param, body_partial_json};
use uuid::Uuid;
use assert_matches::assert_matches;

use medical_ticket_cell::handlers::*;
use medical_ticket_cell::models::{CreateTicketRequest, TicketPriority, TicketSearchQuery, TicketStatus, UpdateTicketRequest};
use medical_ticket_cell::services::TicketService;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockStoreResponses};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

#[tokio::test]
async fn test_staff_opens_ticket() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));
    let patient_id = Uuid::new_v4();
    let ticket_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/medical_tickets"))
        .and(body_partial_json(json!({"status": "open", "priority": "high"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::ticket_row(ticket_id, patient_id, "open")
        ])))
        .mount(&mock_server)
        .await;

    let result = create_ticket(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Json(CreateTicketRequest {
            patient_id,
            title: "Persistent cough".to_string(),
            description: "Persistent cough for two weeks".to_string(),
            priority: TicketPriority::High,
        }),
    ).await;

    let response = result.unwrap().0;
    assert_eq!(response["status"], "open");
    assert!(response["ticket_number"].as_str().unwrap().starts_with("MT-"));
}

#[tokio::test]
async fn test_empty_title_is_rejected() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let result = create_ticket(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Json(CreateTicketRequest {
            patient_id: Uuid::new_v4(),
            title: "".to_string(),
            description: "Something".to_string(),
            priority: TicketPriority::Low,
        }),
    ).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_list_tickets_by_status() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/medical_tickets"))
        .and(query_param("status", "eq.in_progress"))
        .and(query_param("order", "created_at.desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::ticket_row(Uuid::new_v4(), Uuid::new_v4(), "in_progress")
        ])))
        .mount(&mock_server)
        .await;

    let result = list_tickets(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Query(TicketSearchQuery {
            status: Some(TicketStatus::InProgress),
            ..Default::default()
        }),
    ).await;

    assert_eq!(result.unwrap().0["total"], 1);
}

#[tokio::test]
async fn test_resolving_stamps_resolved_at() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));
    let ticket_id = Uuid::new_v4();

    let mut resolved = MockStoreResponses::ticket_row(ticket_id, Uuid::new_v4(), "resolved");
    resolved["resolved_at"] = json!("2024-01-02T00:00:00Z");

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/medical_tickets"))
        .and(query_param("id", format!("eq.{}", ticket_id)))
        .and(body_partial_json(json!({"status": "resolved"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([resolved])))
        .mount(&mock_server)
        .await;

    let result = update_ticket(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Path(ticket_id.to_string()),
        Json(UpdateTicketRequest {
            status: Some(TicketStatus::Resolved),
            ..Default::default()
        }),
    ).await;

    let response = result.unwrap().0;
    assert_eq!(response["status"], "resolved");
    assert_eq!(response["resolved_at"], "2024-01-02T00:00:00Z");
}

#[tokio::test]
async fn test_patient_cannot_update_ticket() {
    let config = TestConfig::default();
    let patient = TestUser::patient("aoife@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let result = update_ticket(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Path(Uuid::new_v4().to_string()),
        Json(UpdateTicketRequest::default()),
    ).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_lookup_by_number_normalizes_input() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let ticket_id = Uuid::new_v4();
    let row = MockStoreResponses::ticket_row(ticket_id, Uuid::new_v4(), "open");
    let number = row["ticket_number"].as_str().unwrap().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/medical_tickets"))
        .and(query_param("ticket_number", format!("eq.{}", number)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(&mock_server)
        .await;

    let service = TicketService::new(&config.to_app_config());
    let spoken = number.trim_start_matches("MT-").to_lowercase();
    let ticket = service.get_ticket_by_number(&spoken, "token").await.unwrap();

    assert_eq!(ticket.unwrap().id, ticket_id);
}
