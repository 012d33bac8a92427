// libs/appointment-cell/src/models.rs
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use schedule_cell::ScheduleError;
use shared_backend::BackendError;
use shared_models::auth::{Role, User};
use shared_models::booking::{Appointment, AppointmentStatus, MedicalExamination, ServiceAppointment};
use shared_models::error::AppError;
use shared_models::time::TimeRange;

// ==============================================================================
// CONFLICTS
// ==============================================================================

/// Outcome of checking one candidate range against existing bookings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictCheck {
    Bookable,
    InPast,
    #[serde(rename_all = "camelCase")]
    Conflicts { appointment_ids: Vec<Uuid> },
}

impl ConflictCheck {
    pub fn is_bookable(&self) -> bool {
        matches!(self, ConflictCheck::Bookable)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictCheckRequest {
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub exclude_appointment_id: Option<Uuid>,
}

impl ConflictCheckRequest {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictReport {
    pub bookable: bool,
    pub patient: Option<ConflictCheck>,
    pub doctor: Option<ConflictCheck>,
}

impl ConflictReport {
    pub fn new(patient: Option<ConflictCheck>, doctor: Option<ConflictCheck>) -> Self {
        let bookable = patient.iter().chain(doctor.iter()).all(ConflictCheck::is_bookable);
        Self {
            bookable,
            patient,
            doctor,
        }
    }
}

// ==============================================================================
// TIMELINE
// ==============================================================================

/// The part of a service appointment the timeline needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineService {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub medical_examinations: Vec<MedicalExamination>,
}

impl From<&ServiceAppointment> for TimelineService {
    fn from(service: &ServiceAppointment) -> Self {
        Self {
            id: Some(service.id),
            medical_examinations: service.medical_examinations.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineSegment {
    /// Service appointment id; `None` for the consultation or an unsaved service.
    pub appointment_id: Option<Uuid>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i64,
}

impl TimelineSegment {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timeline {
    pub segments: Vec<TimelineSegment>,
    pub consultation: TimelineSegment,
    pub total_minutes: i64,
    /// The visit runs past midnight; segment times have wrapped.
    pub ends_next_day: bool,
}

impl Timeline {
    pub fn start_time(&self) -> NaiveTime {
        self.segments
            .first()
            .map(|s| s.start_time)
            .unwrap_or(self.consultation.start_time)
    }

    /// Services first, consultation last.
    pub fn all_segments(&self) -> impl Iterator<Item = &TimelineSegment> {
        self.segments.iter().chain(std::iter::once(&self.consultation))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRequest {
    pub start_time: NaiveTime,
    #[serde(default)]
    pub services: Vec<TimelineService>,
}

// ==============================================================================
// REFUNDS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundQuote {
    pub refund_amount: i64,
    pub refund_percentage: u8,
    pub days_between: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundQuoteRequest {
    pub deposit: i64,
    /// Defaults to today.
    #[serde(default)]
    pub cancel_date: Option<NaiveDate>,
    pub work_date: NaiveDate,
    #[serde(default)]
    pub doctor_changed: bool,
}

// ==============================================================================
// RESCHEDULE AND CANCELLATION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleOutcome {
    pub appointment_id: Uuid,
    pub date: NaiveDate,
    pub timeline: Timeline,
    pub applied: bool,
}

/// Body of `PUT /appointments/{id}` when moving one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentTimeUpdate {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Body of `PUT /appointments/{id}` when cancelling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationUpdate {
    pub status: AppointmentStatus,
    pub cancel_time: NaiveDateTime,
}

/// Body of `PUT /appointments/{id}/refund`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundUpdate {
    pub refund_amount: i64,
    pub refund_percentage: u8,
}

impl From<&RefundQuote> for RefundUpdate {
    fn from(quote: &RefundQuote) -> Self {
        Self {
            refund_amount: quote.refund_amount,
            refund_percentage: quote.refund_percentage,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancellationOutcome {
    pub appointment_id: Uuid,
    pub cancel_time: NaiveDateTime,
    pub cancelled_ids: Vec<Uuid>,
    pub refund: RefundQuote,
}

/// Staff and admins act on any booking; patients and doctors only on their own.
pub fn ensure_can_modify(user: &User, appointment: &Appointment) -> Result<(), AppointmentError> {
    if user.is_clinic_staff() {
        return Ok(());
    }

    let own_id = Uuid::parse_str(&user.id).ok();
    let allowed = match user.role {
        Some(Role::Patient) => own_id == Some(appointment.patient_id),
        Some(Role::Doctor) => own_id.is_some() && own_id == appointment.doctor_id,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppointmentError::Forbidden(appointment.id))
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Appointment time is in the past")]
    InPast,

    #[error("Appointment would run past midnight")]
    EndsNextDay,

    #[error("Doctor is not working at the requested time")]
    OutsideWorkingHours,

    #[error("Appointment conflicts with existing booking: {0:?}")]
    ConflictDetected(Vec<Uuid>),

    #[error("Appointment cannot be modified in current status: {0}")]
    NotModifiable(AppointmentStatus),

    #[error("Appointment {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error("A submission with key {0} is already in progress")]
    AlreadyInFlight(String),

    #[error("Not allowed to modify appointment {0}")]
    Forbidden(Uuid),

    #[error("Schedule lookup failed: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Booking backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::InvalidTime(_)
            | AppointmentError::InPast
            | AppointmentError::EndsNextDay
            | AppointmentError::OutsideWorkingHours => AppError::ValidationError(err.to_string()),
            AppointmentError::ConflictDetected(_)
            | AppointmentError::NotModifiable(_)
            | AppointmentError::AlreadyCancelled(_)
            | AppointmentError::AlreadyInFlight(_) => AppError::Conflict(err.to_string()),
            AppointmentError::Forbidden(_) => AppError::Forbidden(err.to_string()),
            AppointmentError::Schedule(inner) => inner.into(),
            AppointmentError::Backend(inner) => inner.into(),
        }
    }
}
