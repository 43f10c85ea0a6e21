use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use serde_json::json;
use wiremock::{MockServer, Mock, ResponseTemplate};
use wiremock::matchers::{method, path, query_param};
use uuid::Uuid;
use assert_matches::assert_matches;

use prescription_cell::handlers::*;
use prescription_cell::models::{CreatePrescriptionRequest, Prescription, PrescriptionSearchQuery, PrescriptionStatus};
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockStoreResponses};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

fn amoxicillin(patient_id: Uuid, doctor_id: Uuid, refills: i32) -> CreatePrescriptionRequest {
    CreatePrescriptionRequest {
        patient_id,
        doctor_id,
        doctor_name: Some("Dr. Sean Murphy".to_string()),
        medication: "Amoxicillin".to_string(),
        dosage: "500mg".to_string(),
        frequency: Some("Three times daily".to_string()),
        instructions: None,
        refills,
        expires_at: None,
    }
}

#[tokio::test]
async fn test_doctor_issues_prescription() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));
    let patient_id = Uuid::new_v4();
    let doctor_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::prescription_row(Uuid::new_v4(), patient_id, doctor_id, "active")
        ])))
        .mount(&mock_server)
        .await;

    let result = create_prescription(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Json(amoxicillin(patient_id, doctor_id, 1)),
    ).await;

    let response = result.unwrap().0;
    assert_eq!(response["medication"], "Amoxicillin");
    assert_eq!(response["status"], "active");
}

#[tokio::test]
async fn test_patient_cannot_issue_prescription() {
    let config = TestConfig::default();
    let patient = TestUser::patient("aoife@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, Some(1));

    let result = create_prescription(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(patient.to_user()),
        Json(amoxicillin(Uuid::new_v4(), Uuid::new_v4(), 0)),
    ).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_negative_refills_rejected() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let result = create_prescription(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Json(amoxicillin(Uuid::new_v4(), Uuid::new_v4(), -1)),
    ).await;

    assert_matches!(result, Err(AppError::ValidationError(_)));
}

#[tokio::test]
async fn test_list_active_prescriptions() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .and(query_param("patient_id", format!("eq.{}", patient_id)))
        .and(query_param("status", "eq.active"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::prescription_row(Uuid::new_v4(), patient_id, Uuid::new_v4(), "active")
        ])))
        .mount(&mock_server)
        .await;

    let result = list_prescriptions(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Query(PrescriptionSearchQuery {
            patient_id: Some(patient_id),
            status: Some(PrescriptionStatus::Active),
            limit: None,
        }),
    ).await;

    assert_eq!(result.unwrap().0["total"], 1);
}

#[tokio::test]
async fn test_get_prescription_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let doctor = TestUser::doctor("doc@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/prescriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_prescription(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Path(Uuid::new_v4().to_string()),
    ).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[test]
fn test_summary_reads_naturally() {
    let row = MockStoreResponses::prescription_row(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "active");
    let prescription: Prescription = serde_json::from_value(row).unwrap();
    assert_eq!(prescription.summary(), "Amoxicillin 500mg, Three times daily (1 refill left)");
}
