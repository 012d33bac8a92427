use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, BookingPolicy};
use shared_models::auth::{Role, User};

pub struct TestConfig {
    pub jwt_secret: String,
    pub booking_api_url: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            booking_api_url: "http://localhost:8080".to_string(),
        }
    }
}

impl TestConfig {
    /// Points the config at a mock backend, typically a `wiremock` server.
    pub fn with_backend(url: &str) -> Self {
        Self {
            booking_api_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            booking_api_url: self.booking_api_url.clone(),
            jwt_secret: self.jwt_secret.clone(),
            server_port: 0,
            policy: BookingPolicy::default(),
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self::new("test@example.com", Role::Patient)
    }
}

impl TestUser {
    pub fn new(email: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, Role::Doctor)
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, Role::Patient)
    }

    pub fn staff(email: &str) -> Self {
        Self::new(email, Role::Staff)
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, Role::Admin)
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role),
            department_id: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role.to_string(),
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature_encoded =
            general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

        format!("{}.{}", signing_input, signature_encoded)
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

/// Booking-backend payloads in the backend's camelCase wire shape.
pub struct MockBookingResponses;

impl MockBookingResponses {
    pub fn working_interval(doctor_id: &str, work_date: &str, start: &str, end: &str) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctorId": doctor_id,
            "workDate": work_date,
            "startTime": start,
            "endTime": end
        })
    }

    pub fn appointment(
        id: &str,
        patient_id: &str,
        doctor_id: &str,
        date: &str,
        start: &str,
        end: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "patientId": patient_id,
            "doctorId": doctor_id,
            "date": date,
            "startTime": start,
            "endTime": end,
            "status": status,
            "serviceAppointments": [],
            "deposit": null,
            "cancelTime": null,
            "removedByScheduleChange": false
        })
    }

    pub fn service_appointment(
        id: &str,
        parent_id: &str,
        patient_id: &str,
        date: &str,
        start: &str,
        end: &str,
        examination_minutes: &[i64],
    ) -> serde_json::Value {
        let examinations: Vec<serde_json::Value> = examination_minutes
            .iter()
            .enumerate()
            .map(|(i, minutes)| json!({
                "id": Uuid::new_v4(),
                "name": format!("Examination {}", i + 1),
                "durationMinutes": minutes
            }))
            .collect();

        json!({
            "id": id,
            "parentAppointmentId": parent_id,
            "patientId": patient_id,
            "doctorId": null,
            "date": date,
            "startTime": start,
            "endTime": end,
            "status": "CONFIRMED",
            "medicalExaminations": examinations
        })
    }

    pub fn error_response(message: &str) -> serde_json::Value {
        json!({ "message": message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let app_config = TestConfig::with_backend("http://127.0.0.1:9999").to_app_config();

        assert_eq!(app_config.booking_api_url, "http://127.0.0.1:9999");
        assert!(!app_config.jwt_secret.is_empty());
        assert_eq!(app_config.policy, BookingPolicy::default());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        let user_model = user.to_user();

        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(Role::Doctor));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_creation() {
        let token = JwtTestUtils::create_test_token(&TestUser::default(), "test-secret", Some(1));
        assert_eq!(token.split('.').count(), 3);
    }
}
