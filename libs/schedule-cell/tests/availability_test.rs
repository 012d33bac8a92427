// libs/schedule-cell/tests/availability_test.rs

use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::services::AvailabilityService;
use shared_backend::BearerSession;
use shared_utils::test_utils::{MockBookingResponses, TestConfig};

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn work_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn service_for(server: &MockServer) -> AvailabilityService {
    let config = TestConfig::with_backend(&server.uri()).to_app_config();
    AvailabilityService::new(&config, BearerSession::shared("test-token"))
}

async fn mount_schedule(server: &MockServer, doctor_id: Uuid, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/schedule/{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_appointments(server: &MockServer, doctor_id: Uuid, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/appointments/doctor/{}/date/2025-03-10", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn single_booking_blocks_exactly_one_slot() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    let patient = Uuid::new_v4().to_string();

    mount_schedule(&server, doctor, json!([
        { "workDate": "2025-03-10", "startTime": "07:00:00", "endTime": "17:00:00" }
    ]))
    .await;
    mount_appointments(&server, doctor, json!([
        MockBookingResponses::appointment(
            &Uuid::new_v4().to_string(), &patient, &doctor.to_string(),
            "2025-03-10", "09:00:00", "09:10:00", "CONFIRMED"
        )
    ]))
    .await;

    let before_day = work_date().pred_opt().unwrap().and_hms_opt(12, 0, 0).unwrap();
    let result = service_for(&server)
        .get_available_slots(doctor, work_date(), before_day)
        .await
        .unwrap();

    assert!(!result.uses_default_schedule);
    assert_eq!(result.slots.len(), 60);
    let blocked: Vec<NaiveTime> = result.slots.iter().filter(|s| !s.available).map(|s| s.start_time).collect();
    assert_eq!(blocked, vec![t(9, 0)]);

    let open = result.available_only();
    assert_eq!(open.slots.len(), 59);
}

#[tokio::test]
async fn empty_schedule_falls_back_to_default_window() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    mount_schedule(&server, doctor, json!([])).await;
    mount_appointments(&server, doctor, json!([])).await;

    let result = service_for(&server)
        .get_available_slots(doctor, work_date(), work_date().and_hms_opt(0, 0, 0).unwrap())
        .await
        .unwrap();

    assert!(result.uses_default_schedule);
    assert_eq!(result.slots.first().unwrap().start_time, t(7, 0));
    assert_eq!(result.slots.last().unwrap().end_time, t(17, 0));
}

#[tokio::test]
async fn fan_out_keys_results_by_doctor() {
    let server = MockServer::start().await;
    let early = Uuid::new_v4();
    let late = Uuid::new_v4();

    mount_schedule(&server, early, json!([
        MockBookingResponses::working_interval(&early.to_string(), "2025-03-10", "08:00:00", "09:00:00")
    ]))
    .await;
    mount_schedule(&server, late, json!([
        MockBookingResponses::working_interval(&late.to_string(), "2025-03-10", "15:00:00", "15:30:00")
    ]))
    .await;
    mount_appointments(&server, early, json!([])).await;
    mount_appointments(&server, late, json!([])).await;

    let by_doctor = service_for(&server)
        .get_slots_for_doctors(&[late, early, late], work_date(), work_date().and_hms_opt(0, 0, 0).unwrap())
        .await
        .unwrap();

    assert_eq!(by_doctor.len(), 2);
    assert_eq!(by_doctor[&early].slots.len(), 6);
    assert_eq!(by_doctor[&late].slots.len(), 3);
    assert_eq!(by_doctor[&late].slots[0].start_time, t(15, 0));
}

#[tokio::test]
async fn working_hours_check_uses_effective_intervals() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    mount_schedule(&server, doctor, json!([
        { "workDate": "2025-03-10", "startTime": "08:00:00", "endTime": "12:00:00" }
    ]))
    .await;

    let service = service_for(&server);
    let inside = shared_models::time::TimeRange::new(t(11, 40), t(11, 50));
    let outside = shared_models::time::TimeRange::new(t(11, 55), t(12, 5));

    assert!(service.is_within_working_hours(doctor, work_date(), inside).await.unwrap());
    assert!(!service.is_within_working_hours(doctor, work_date(), outside).await.unwrap());
}

#[tokio::test]
async fn backend_failure_propagates() {
    let server = MockServer::start().await;
    let doctor = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/schedule/{}", doctor)))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;
    mount_appointments(&server, doctor, json!([])).await;

    let result = service_for(&server)
        .get_available_slots(doctor, work_date(), work_date().and_hms_opt(0, 0, 0).unwrap())
        .await;
    assert!(result.is_err());
}
