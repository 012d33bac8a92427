use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{Local, NaiveDate, NaiveDateTime};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_backend::idempotency::IDEMPOTENCY_HEADER;
use shared_backend::{BearerSession, IdempotencyKey};
use shared_config::AppConfig;
use shared_models::auth::{Role, User};
use shared_models::error::AppError;
use shared_utils::extractor::require_any_role;

use crate::models::{BulkChangeRequestInput, BulkSlotsRequest, ChangeRequestInput};
use crate::services::{AvailabilityService, ScheduleChangeService};

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
    pub available_only: Option<bool>,
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn user_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("User id in token is not a valid id".to_string()))
}

fn idempotency_key(headers: &HeaderMap, body_key: Option<&str>) -> IdempotencyKey {
    let header_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok());
    IdempotencyKey::from_client(header_key.or(body_key))
}

// ==============================================================================
// SLOTS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<SlotsQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let service = AvailabilityService::new(&state, BearerSession::shared(auth.token()));

    let mut doctor_slots = service.get_available_slots(doctor_id, query.date, now()).await?;
    if query.available_only.unwrap_or(false) {
        doctor_slots = doctor_slots.available_only();
    }

    Ok(Json(json!(doctor_slots)))
}

#[axum::debug_handler]
pub async fn get_bulk_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Json(request): Json<BulkSlotsRequest>,
) -> Result<Json<Value>, AppError> {
    if request.doctor_ids.is_empty() {
        return Err(AppError::ValidationError("At least one doctor id is required".to_string()));
    }

    let service = AvailabilityService::new(&state, BearerSession::shared(auth.token()));
    let by_doctor = service
        .get_slots_for_doctors(&request.doctor_ids, request.date, now())
        .await?;

    let doctors: Vec<Value> = by_doctor
        .into_values()
        .map(|slots| {
            if request.available_only {
                json!(slots.available_only())
            } else {
                json!(slots)
            }
        })
        .collect();

    Ok(Json(json!({
        "date": request.date,
        "doctors": doctors
    })))
}

// ==============================================================================
// SCHEDULE CHANGE REQUESTS
// ==============================================================================

#[axum::debug_handler]
pub async fn preview_change_request(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
    Json(input): Json<ChangeRequestInput>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[Role::Staff, Role::Admin])?;
    let staff_id = user_uuid(&user)?;

    let service = ScheduleChangeService::new(&state, BearerSession::shared(auth.token()));
    let key = idempotency_key(&headers, input.idempotency_key.as_deref());
    let plan = service.preview(&input, staff_id, key, now()).await?;

    Ok(Json(json!(plan)))
}

#[axum::debug_handler]
pub async fn submit_change_request(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
    Json(input): Json<ChangeRequestInput>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[Role::Staff, Role::Admin])?;
    let staff_id = user_uuid(&user)?;

    let service = ScheduleChangeService::new(&state, BearerSession::shared(auth.token()));
    let key = idempotency_key(&headers, input.idempotency_key.as_deref());
    let plan = service.submit(&input, staff_id, key, now()).await?;

    Ok(Json(json!(plan)))
}

#[axum::debug_handler]
pub async fn submit_bulk_change_requests(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
    Json(input): Json<BulkChangeRequestInput>,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[Role::Staff, Role::Admin])?;
    if input.requests.is_empty() {
        return Err(AppError::ValidationError("At least one schedule change is required".to_string()));
    }
    let staff_id = user_uuid(&user)?;

    let service = ScheduleChangeService::new(&state, BearerSession::shared(auth.token()));
    let key = idempotency_key(&headers, input.idempotency_key.as_deref());
    let plans = service.submit_bulk(&input.requests, staff_id, key, now()).await?;

    Ok(Json(json!({
        "requests": plans,
        "total": plans.len()
    })))
}

#[axum::debug_handler]
pub async fn approve_change_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[Role::Doctor])?;
    let doctor_id = user_uuid(&user)?;

    let service = ScheduleChangeService::new(&state, BearerSession::shared(auth.token()));
    let request = service
        .approve(request_id, doctor_id, idempotency_key(&headers, None))
        .await?;

    Ok(Json(json!(request)))
}

#[axum::debug_handler]
pub async fn reject_change_request(
    State(state): State<Arc<AppConfig>>,
    Path(request_id): Path<Uuid>,
    Extension(user): Extension<User>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    require_any_role(&user, &[Role::Doctor])?;
    let doctor_id = user_uuid(&user)?;

    let service = ScheduleChangeService::new(&state, BearerSession::shared(auth.token()));
    let request = service
        .reject(request_id, doctor_id, idempotency_key(&headers, None))
        .await?;

    Ok(Json(json!(request)))
}
