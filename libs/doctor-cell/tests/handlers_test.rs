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

use doctor_cell::handlers::*;
use doctor_cell::models::{CreateDoctorRequest, DoctorSearchFilters};
use doctor_cell::services::DoctorService;
use shared_models::error::AppError;
use shared_utils::test_utils::{TestConfig, TestUser, JwtTestUtils, MockStoreResponses};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    TypedHeader(Authorization::bearer(token).unwrap())
}

#[tokio::test]
async fn test_list_doctors_by_specialty() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let user = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("specialty", "ilike.*cardio*"))
        .and(query_param("is_available", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(Uuid::new_v4(), "Dr. Sean Murphy", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;

    let result = list_doctors(
        State(config.to_arc()),
        create_auth_header(&token),
        Query(DoctorSearchFilters {
            specialty: Some("cardio".to_string()),
            available_only: Some(true),
            ..Default::default()
        }),
    ).await;

    let response = result.unwrap().0;
    assert_eq!(response["total"], 1);
    assert_eq!(response["doctors"][0]["specialty"], "Cardiology");
}

#[tokio::test]
async fn test_get_doctor_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let user = TestUser::patient("p@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = get_doctor(
        State(config.to_arc()),
        create_auth_header(&token),
        Path(Uuid::new_v4().to_string()),
    ).await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn test_create_doctor_requires_admin() {
    let config = TestConfig::default();
    let doctor = TestUser::doctor("d@example.com");
    let token = JwtTestUtils::create_test_token(&doctor, &config.jwt_secret, Some(1));

    let result = create_doctor(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(doctor.to_user()),
        Json(CreateDoctorRequest {
            user_id: None,
            full_name: "Dr. Niamh Walsh".to_string(),
            email: "niamh@example.com".to_string(),
            specialty: "Dermatology".to_string(),
            phone_number: None,
            bio: None,
        }),
    ).await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_find_by_name_strips_title() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("full_name", "ilike.*Murphy*"))
        .and(query_param("limit", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(Uuid::new_v4(), "Dr. Sean Murphy", "Cardiology")
        ])))
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(&config.to_app_config());
    let doctor = service.find_by_name("Dr. Murphy", "token").await.unwrap();

    assert_eq!(doctor.unwrap().full_name, "Dr. Sean Murphy");
}

#[tokio::test]
async fn test_find_by_name_strips_title_in_any_case() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("full_name", "ilike.*murphy*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(Uuid::new_v4(), "Dr. Sean Murphy", "Cardiology")
        ])))
        .expect(2)
        .mount(&mock_server)
        .await;

    let service = DoctorService::new(&config.to_app_config());
    for spoken in ["dr. murphy", "DOCTOR murphy"] {
        let doctor = service.find_by_name(spoken, "token").await.unwrap();
        assert_eq!(doctor.unwrap().full_name, "Dr. Sean Murphy");
    }
}

#[tokio::test]
async fn test_create_doctor_duplicate_email_ignores_case() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::with_mock_server(&mock_server.uri());
    let admin = TestUser::admin("admin@example.com");
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("email", "eq.niamh@example.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(Uuid::new_v4(), "Dr. Niamh Walsh", "Dermatology")
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = create_doctor(
        State(config.to_arc()),
        create_auth_header(&token),
        Extension(admin.to_user()),
        Json(CreateDoctorRequest {
            user_id: None,
            full_name: "Dr. Niamh Walsh".to_string(),
            email: "Niamh@Example.com".to_string(),
            specialty: "Dermatology".to_string(),
            phone_number: None,
            bio: None,
        }),
    ).await;

    assert_matches!(result, Err(AppError::Conflict(_)));
}
