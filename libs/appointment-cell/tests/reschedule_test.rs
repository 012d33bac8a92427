// libs/appointment-cell/tests/reschedule_test.rs

use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, RescheduleRequest};
use appointment_cell::services::RescheduleService;
use shared_backend::{BearerSession, IdempotencyKey};
use shared_utils::test_utils::{MockBookingResponses, TestConfig, TestUser};

struct Fixture {
    server: MockServer,
    appointment_id: Uuid,
    service_id: Uuid,
    patient_id: Uuid,
    blocking_id: Uuid,
}

fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

fn work_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).unwrap()
}

fn day_before() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 9).unwrap().and_hms_opt(12, 0, 0).unwrap()
}

fn move_to(h: u32, m: u32) -> RescheduleRequest {
    RescheduleRequest {
        date: work_date(),
        start_time: t(h, m),
        idempotency_key: None,
    }
}

/// Appointment with one 20 minute service, a 07:00-17:00 doctor day and a
/// second patient booked at 14:00.
async fn fixture() -> Fixture {
    let server = MockServer::start().await;
    let (appointment_id, service_id) = (Uuid::new_v4(), Uuid::new_v4());
    let (patient_id, doctor_id, blocking_id) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    let mut appointment = MockBookingResponses::appointment(
        &appointment_id.to_string(), &patient_id.to_string(), &doctor_id.to_string(),
        "2025-03-10", "09:25:00", "09:35:00", "CONFIRMED",
    );
    appointment["serviceAppointments"] = json!([MockBookingResponses::service_appointment(
        &service_id.to_string(), &appointment_id.to_string(), &patient_id.to_string(),
        "2025-03-10", "09:00:00", "09:20:00", &[20],
    )]);
    let blocking = MockBookingResponses::appointment(
        &blocking_id.to_string(), &Uuid::new_v4().to_string(), &doctor_id.to_string(),
        "2025-03-10", "14:00:00", "14:10:00", "PENDING",
    );

    Mock::given(method("GET"))
        .and(path(format!("/appointments/{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(&appointment))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/schedule/{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "workDate": "2025-03-10", "startTime": "07:00:00", "endTime": "17:00:00" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/appointments/doctor/{}/date/2025-03-10", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment, blocking])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/appointments/date/2025-03-10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment, blocking])))
        .mount(&server)
        .await;

    Fixture {
        server,
        appointment_id,
        service_id,
        patient_id,
        blocking_id,
    }
}

fn service_for(server: &MockServer) -> RescheduleService {
    let config = TestConfig::with_backend(&server.uri()).to_app_config();
    RescheduleService::new(&config, BearerSession::shared("test-token"))
}

async fn expect_no_writes(server: &MockServer) {
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn reschedule_moves_every_segment() {
    let f = fixture().await;

    Mock::given(method("PUT"))
        .and(path(format!("/appointments/{}", f.service_id)))
        .and(header("Idempotency-Key", format!("move-1:{}", f.service_id).as_str()))
        .and(body_json(json!({ "date": "2025-03-10", "startTime": "13:00:00", "endTime": "13:20:00" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&f.server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/appointments/{}", f.appointment_id)))
        .and(header("Idempotency-Key", "move-1:consultation"))
        .and(body_json(json!({ "date": "2025-03-10", "startTime": "13:25:00", "endTime": "13:35:00" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&f.server)
        .await;

    let staff = TestUser::staff("desk@clinic.test").to_user();
    let key = IdempotencyKey::from_client(Some("move-1"));
    let outcome = service_for(&f.server)
        .reschedule(f.appointment_id, &move_to(13, 0), &staff, &key, day_before())
        .await
        .unwrap();

    assert!(outcome.applied);
    assert_eq!(outcome.timeline.segments.len(), 1);
    assert_eq!(outcome.timeline.consultation.start_time, t(13, 25));
    assert_eq!(outcome.timeline.total_minutes, 35);
}

#[tokio::test]
async fn failed_consultation_move_surfaces_backend_error() {
    let f = fixture().await;

    Mock::given(method("PUT"))
        .and(path(format!("/appointments/{}", f.service_id)))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&f.server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("/appointments/{}", f.appointment_id)))
        .respond_with(ResponseTemplate::new(503).set_body_string("try again later"))
        .expect(1)
        .mount(&f.server)
        .await;

    let staff = TestUser::staff("desk@clinic.test").to_user();
    let result = service_for(&f.server)
        .reschedule(f.appointment_id, &move_to(13, 0), &staff, &IdempotencyKey::from_client(Some("move-2")), day_before())
        .await;

    assert_matches!(result, Err(AppointmentError::Backend(_)));
}

#[tokio::test]
async fn overlapping_consultation_is_refused_without_writes() {
    let f = fixture().await;
    expect_no_writes(&f.server).await;

    let staff = TestUser::staff("desk@clinic.test").to_user();
    let result = service_for(&f.server)
        .reschedule(f.appointment_id, &move_to(13, 40), &staff, &IdempotencyKey::generate(), day_before())
        .await;

    assert_matches!(result, Err(AppointmentError::ConflictDetected(ids)) if ids == vec![f.blocking_id]);
}

#[tokio::test]
async fn consultation_after_working_hours_is_refused() {
    let f = fixture().await;
    expect_no_writes(&f.server).await;

    let staff = TestUser::staff("desk@clinic.test").to_user();
    let result = service_for(&f.server)
        .preview(f.appointment_id, &move_to(16, 40), &staff, day_before())
        .await;

    assert_matches!(result, Err(AppointmentError::OutsideWorkingHours));
}

#[tokio::test]
async fn own_segments_never_conflict_with_the_move() {
    let f = fixture().await;
    expect_no_writes(&f.server).await;

    let owner = TestUser::patient("patient@clinic.test")
        .with_id(&f.patient_id.to_string())
        .to_user();
    let outcome = service_for(&f.server)
        .preview(f.appointment_id, &move_to(9, 10), &owner, day_before())
        .await
        .unwrap();

    assert!(!outcome.applied);
    assert_eq!(outcome.timeline.segments[0].start_time, t(9, 10));
}

#[tokio::test]
async fn other_patients_cannot_move_the_booking() {
    let f = fixture().await;
    expect_no_writes(&f.server).await;

    let stranger = TestUser::patient("someone@clinic.test").to_user();
    let result = service_for(&f.server)
        .reschedule(f.appointment_id, &move_to(13, 0), &stranger, &IdempotencyKey::generate(), day_before())
        .await;

    assert_matches!(result, Err(AppointmentError::Forbidden(id)) if id == f.appointment_id);
}

#[tokio::test]
async fn missing_appointment_surfaces_backend_not_found() {
    let server = MockServer::start().await;
    let missing = Uuid::new_v4();
    Mock::given(method("GET"))
        .and(path(format!("/appointments/{}", missing)))
        .respond_with(ResponseTemplate::new(404).set_body_json(MockBookingResponses::error_response("not found")))
        .mount(&server)
        .await;

    let staff = TestUser::staff("desk@clinic.test").to_user();
    let result = service_for(&server)
        .preview(missing, &move_to(13, 0), &staff, day_before())
        .await;

    assert_matches!(result, Err(AppointmentError::Backend(_)));
}
