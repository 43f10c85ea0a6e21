use std::sync::Arc;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use base64::{Engine as _, engine::general_purpose};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub service_role_key: String,
    pub voice_webhook_secret: String,
    pub auth_webhook_secret: String,
    pub auth_api_url: String,
    pub calendar_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            service_role_key: "test-service-role-key".to_string(),
            voice_webhook_secret: "test-voice-secret".to_string(),
            auth_webhook_secret: WebhookTestUtils::SECRET.to_string(),
            auth_api_url: "http://localhost:54322".to_string(),
            calendar_api_url: "http://localhost:54323".to_string(),
        }
    }
}

impl TestConfig {
    /// Points every hosted dependency at one mock server.
    pub fn with_mock_server(uri: &str) -> Self {
        Self {
            supabase_url: uri.to_string(),
            auth_api_url: uri.to_string(),
            calendar_api_url: uri.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_service_role_key: self.service_role_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            voice_webhook_secret: self.voice_webhook_secret.clone(),
            auth_webhook_secret: self.auth_webhook_secret.clone(),
            auth_api_url: self.auth_api_url.clone(),
            auth_secret_key: "sk_test_secret".to_string(),
            calendar_api_url: self.calendar_api_url.clone(),
            port: 3000,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_token_with_claims(secret: &str, payload: Value) -> String {
        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        Self::create_token_with_claims(secret, json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        }))
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Signs auth-provider webhook payloads the way the provider does.
pub struct WebhookTestUtils;

impl WebhookTestUtils {
    /// `whsec_` + base64("test-webhook-signing-key")
    pub const SECRET: &'static str = "whsec_dGVzdC13ZWJob29rLXNpZ25pbmcta2V5";

    pub fn sign(secret: &str, msg_id: &str, timestamp: i64, body: &str) -> String {
        let encoded = secret.strip_prefix("whsec_").unwrap_or(secret);
        let key = general_purpose::STANDARD
            .decode(encoded)
            .expect("test secret is valid base64");

        let mut mac = Hmac::<Sha256>::new_from_slice(&key)
            .expect("HMAC can take key of any size");
        mac.update(format!("{}.{}.{}", msg_id, timestamp, body).as_bytes());

        format!("v1,{}", general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    /// `(svix-id, svix-timestamp, svix-signature)` for a body signed now.
    pub fn headers_for(body: &str) -> (String, String, String) {
        let msg_id = format!("msg_{}", Uuid::new_v4().simple());
        let timestamp = Utc::now().timestamp();
        let signature = Self::sign(Self::SECRET, &msg_id, timestamp, body);
        (msg_id, timestamp.to_string(), signature)
    }
}

/// Row fixtures shaped like the hosted store's tables.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn patient_row(patient_id: Uuid, email: &str) -> Value {
        json!({
            "id": patient_id,
            "user_id": null,
            "first_name": "Aoife",
            "last_name": "Byrne",
            "email": email,
            "phone_number": "+353851234567",
            "date_of_birth": "1988-03-14",
            "gender": "female",
            "allergies": "Penicillin",
            "medical_history": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_row(doctor_id: Uuid, full_name: &str, specialty: &str) -> Value {
        json!({
            "id": doctor_id,
            "user_id": null,
            "full_name": full_name,
            "email": "doctor@example.com",
            "specialty": specialty,
            "phone_number": null,
            "bio": null,
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(appointment_id: Uuid, patient_id: Uuid, doctor_id: Option<Uuid>, status: &str) -> Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "patient_name": "Aoife Byrne",
            "doctor_name": "Dr. Sean Murphy",
            "appointment_date": (Utc::now() + Duration::days(3)).to_rfc3339(),
            "reason": "Follow-up",
            "status": status,
            "source": "dashboard",
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn ticket_row(ticket_id: Uuid, patient_id: Uuid, status: &str) -> Value {
        let number = ticket_id.simple().to_string()[..8].to_uppercase();
        json!({
            "id": ticket_id,
            "ticket_number": format!("MT-{}", number),
            "patient_id": patient_id,
            "title": "Persistent cough",
            "description": "Persistent cough for two weeks",
            "priority": "medium",
            "status": status,
            "assigned_doctor_id": null,
            "notes": null,
            "resolved_at": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn prescription_row(prescription_id: Uuid, patient_id: Uuid, doctor_id: Uuid, status: &str) -> Value {
        json!({
            "id": prescription_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "doctor_name": "Dr. Sean Murphy",
            "medication": "Amoxicillin",
            "dosage": "500mg",
            "frequency": "Three times daily",
            "instructions": "Take with food",
            "refills_remaining": 1,
            "status": status,
            "issued_at": "2024-01-01T00:00:00Z",
            "expires_at": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn error_response(message: &str, code: &str) -> Value {
        json!({
            "message": message,
            "code": code
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
        assert!(app_config.is_voice_configured());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
        assert!(user_model.is_staff());
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let token = JwtTestUtils::create_test_token(&user, "test-secret", Some(1));

        assert_eq!(token.split('.').count(), 3);
    }

    #[test]
    fn test_webhook_signature_format() {
        let signature = WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", 1_700_000_000, "{}");
        assert!(signature.starts_with("v1,"));
        assert_eq!(signature, WebhookTestUtils::sign(WebhookTestUtils::SECRET, "msg_1", 1_700_000_000, "{}"));
    }
}
