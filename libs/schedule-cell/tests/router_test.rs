// libs/schedule-cell/tests/router_test.rs

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::router::schedule_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

fn bearer(config: &TestConfig, user: &TestUser) -> String {
    format!("Bearer {}", JwtTestUtils::create_test_token(user, &config.jwt_secret, None))
}

#[tokio::test]
async fn slots_endpoint_filters_unavailable() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/schedule/{}", doctor)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "workDate": "2031-03-10", "startTime": "09:00:00", "endTime": "10:00:00" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/appointments/doctor/{}/date/2031-03-10", doctor)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": Uuid::new_v4(),
            "patientId": Uuid::new_v4(),
            "doctorId": doctor,
            "date": "2031-03-10",
            "startTime": "09:00:00",
            "endTime": "09:30:00",
            "status": "CONFIRMED"
        }])))
        .mount(&server)
        .await;

    let config = TestConfig::with_backend(&server.uri());
    let response = schedule_routes(config.to_arc())
        .oneshot(
            Request::builder()
                .uri(format!("/{}/slots?date=2031-03-10&available_only=true", doctor))
                .header("Authorization", bearer(&config, &TestUser::patient("p@clinic.test")))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = serde_json::from_slice(&to_bytes(response.into_body(), usize::MAX).await.unwrap()).unwrap();
    let slots = body["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 3);
    assert_eq!(slots[0]["startTime"], "09:30:00");
}

#[tokio::test]
async fn patients_cannot_propose_schedule_changes() {
    let config = TestConfig::default();
    let response = schedule_routes(config.to_arc())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/change-requests/preview")
                .header("Authorization", bearer(&config, &TestUser::patient("p@clinic.test")))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "changeType": "CREATE",
                        "targetDoctorId": Uuid::new_v4(),
                        "workDate": "2031-03-10",
                        "startTime": "09:00:00",
                        "endTime": "12:00:00"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn staff_get_validation_error_for_backwards_interval() {
    let config = TestConfig::default();
    let staff = TestUser::staff("desk@clinic.test");
    let response = schedule_routes(config.to_arc())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/change-requests/preview")
                .header("Authorization", bearer(&config, &staff))
                .header("Content-Type", "application/json")
                .body(Body::from(
                    json!({
                        "changeType": "CREATE",
                        "targetDoctorId": Uuid::new_v4(),
                        "workDate": "2031-03-10",
                        "startTime": "12:00:00",
                        "endTime": "09:00:00"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let response = schedule_routes(TestConfig::default().to_arc())
        .oneshot(
            Request::builder()
                .uri(format!("/{}/slots?date=2031-03-10", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
