use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Local, NaiveDateTime};
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_backend::idempotency::IDEMPOTENCY_HEADER;
use shared_backend::{BearerSession, IdempotencyKey};
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{ConflictCheckRequest, ConflictReport, RefundQuoteRequest, RescheduleRequest, TimelineRequest};
use crate::services::refund::evaluate_refund;
use crate::services::timeline::build_timeline;
use crate::services::{CancellationService, ConflictService, RescheduleService, SubmissionGuard};

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn idempotency_key(headers: &HeaderMap, body_key: Option<&str>) -> IdempotencyKey {
    let header_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok());
    IdempotencyKey::from_client(header_key.or(body_key))
}

// ==============================================================================
// CONFLICTS AND TIMELINES
// ==============================================================================

#[axum::debug_handler]
pub async fn check_conflicts(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(mut request): Json<ConflictCheckRequest>,
) -> Result<Json<Value>, AppError> {
    if !request.range().is_valid() {
        return Err(AppError::ValidationError("End time must be after start time".to_string()));
    }

    if user.has_role(Role::Patient) {
        let own_id = Uuid::parse_str(&user.id)
            .map_err(|_| AppError::Auth("User id in token is not a valid id".to_string()))?;
        match request.patient_id {
            Some(patient_id) if patient_id != own_id => {
                return Err(AppError::Forbidden("Patients can only check their own bookings".to_string()));
            }
            _ => request.patient_id = Some(own_id),
        }
    }

    if request.patient_id.is_none() && request.doctor_id.is_none() {
        return Err(AppError::ValidationError("A patient or doctor id is required".to_string()));
    }

    let service = ConflictService::new(&state, BearerSession::shared(auth.token()));
    let exclude: Vec<Uuid> = request.exclude_appointment_id.into_iter().collect();
    let now = now();

    let patient = match request.patient_id {
        Some(patient_id) => Some(
            service
                .check_patient(patient_id, request.date, request.range(), &exclude, now)
                .await?,
        ),
        None => None,
    };
    let doctor = match request.doctor_id {
        Some(doctor_id) => Some(
            service
                .check_doctor(doctor_id, request.date, request.range(), &exclude, now)
                .await?,
        ),
        None => None,
    };

    Ok(Json(json!(ConflictReport::new(patient, doctor))))
}

#[axum::debug_handler]
pub async fn build_visit_timeline(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<TimelineRequest>,
) -> Result<Json<Value>, AppError> {
    let timeline = build_timeline(request.start_time, &request.services, &state.policy);
    Ok(Json(json!(timeline)))
}

// ==============================================================================
// REFUNDS AND CANCELLATION
// ==============================================================================

#[axum::debug_handler]
pub async fn quote_refund(Json(request): Json<RefundQuoteRequest>) -> Result<Json<Value>, AppError> {
    let cancel_date = request.cancel_date.unwrap_or_else(|| now().date());
    let quote = evaluate_refund(request.deposit, cancel_date, request.work_date, request.doctor_changed);
    Ok(Json(json!(quote)))
}

#[axum::debug_handler]
pub async fn get_refund_quote(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = CancellationService::new(&state, BearerSession::shared(auth.token()));
    let quote = service.quote(appointment_id, &user, now().date()).await?;
    Ok(Json(json!(quote)))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Extension(guard): Extension<SubmissionGuard>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let key = idempotency_key(&headers, None);
    let _ticket = guard.begin(&key)?;

    let service = CancellationService::new(&state, BearerSession::shared(auth.token()));
    let outcome = service.cancel(appointment_id, &user, &key, now()).await?;
    Ok(Json(json!(outcome)))
}

// ==============================================================================
// RESCHEDULE
// ==============================================================================

#[axum::debug_handler]
pub async fn preview_reschedule(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let service = RescheduleService::new(&state, BearerSession::shared(auth.token()));
    let outcome = service.preview(appointment_id, &request, &user, now()).await?;
    Ok(Json(json!(outcome)))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<User>,
    Extension(guard): Extension<SubmissionGuard>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let key = idempotency_key(&headers, request.idempotency_key.as_deref());
    let _ticket = guard.begin(&key)?;

    let service = RescheduleService::new(&state, BearerSession::shared(auth.token()));
    let outcome = service
        .reschedule(appointment_id, &request, &user, &key, now())
        .await?;
    Ok(Json(json!(outcome)))
}
