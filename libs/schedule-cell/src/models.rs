// libs/schedule-cell/src/models.rs
use std::collections::BTreeSet;
use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_backend::{BackendError, IdempotencyKey};
use shared_models::error::AppError;
use shared_models::time::TimeRange;

// ==============================================================================
// SLOTS
// ==============================================================================

/// A quantized booking window; derived on every query and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub available: bool,
}

impl Slot {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSlots {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub uses_default_schedule: bool,
    pub slots: Vec<Slot>,
}

impl DoctorSlots {
    pub fn available_only(mut self) -> Self {
        self.slots.retain(|slot| slot.available);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkSlotsRequest {
    pub doctor_ids: Vec<Uuid>,
    pub date: NaiveDate,
    #[serde(default)]
    pub available_only: bool,
}

// ==============================================================================
// SCHEDULE CHANGE REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Applied,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "PENDING"),
            RequestStatus::Approved => write!(f, "APPROVED"),
            RequestStatus::Rejected => write!(f, "REJECTED"),
            RequestStatus::Applied => write!(f, "APPLIED"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorDecision {
    pub doctor_id: Uuid,
    pub decision: Decision,
}

/// Result of recording a doctor's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOutcome {
    Recorded,
    /// The same doctor already made the same decision.
    Unchanged,
}

/// What staff propose to do to one working interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleChangeProposal {
    pub change_type: ChangeType,
    pub target_doctor_id: Uuid,
    pub work_date: NaiveDate,
    #[serde(default)]
    pub working_interval_id: Option<Uuid>,
    #[serde(default)]
    pub start_time: Option<NaiveTime>,
    #[serde(default)]
    pub end_time: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl ScheduleChangeProposal {
    pub fn validate(&self) -> Result<(), ScheduleError> {
        match self.change_type {
            ChangeType::Create => {
                self.proposed_range()?;
            }
            ChangeType::Update => {
                self.require_interval_id()?;
                self.proposed_range()?;
            }
            ChangeType::Delete => {
                self.require_interval_id()?;
            }
        }
        Ok(())
    }

    pub fn proposed_range(&self) -> Result<TimeRange, ScheduleError> {
        let (Some(start), Some(end)) = (self.start_time, self.end_time) else {
            return Err(ScheduleError::InvalidProposal(
                "Start and end time are required".to_string(),
            ));
        };
        let range = TimeRange::new(start, end);
        if !range.is_valid() {
            return Err(ScheduleError::InvalidInterval(
                "Start time must be before end time".to_string(),
            ));
        }
        Ok(range)
    }

    fn require_interval_id(&self) -> Result<Uuid, ScheduleError> {
        self.working_interval_id.ok_or_else(|| {
            ScheduleError::InvalidProposal("Working interval id is required".to_string())
        })
    }
}

/// A staff-initiated change awaiting approval by every affected doctor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleChangeRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub change_type: ChangeType,
    pub target_doctor_id: Uuid,
    pub staff_id: Uuid,
    pub work_date: NaiveDate,
    #[serde(default)]
    pub working_interval_id: Option<Uuid>,
    #[serde(default)]
    pub proposed_start: Option<NaiveTime>,
    #[serde(default)]
    pub proposed_end: Option<NaiveTime>,
    #[serde(default)]
    pub reason: Option<String>,
    pub affected_doctor_ids: Vec<Uuid>,
    pub decisions: Vec<DoctorDecision>,
    pub status: RequestStatus,
    pub idempotency_key: IdempotencyKey,
    pub created_at: NaiveDateTime,
}

impl ScheduleChangeRequest {
    pub fn new(
        proposal: &ScheduleChangeProposal,
        staff_id: Uuid,
        affected: BTreeSet<Uuid>,
        idempotency_key: IdempotencyKey,
        created_at: NaiveDateTime,
    ) -> Self {
        let affected_doctor_ids: Vec<Uuid> = affected.into_iter().collect();
        let decisions = affected_doctor_ids
            .iter()
            .map(|doctor_id| DoctorDecision {
                doctor_id: *doctor_id,
                decision: Decision::Pending,
            })
            .collect();

        Self {
            id: None,
            change_type: proposal.change_type,
            target_doctor_id: proposal.target_doctor_id,
            staff_id,
            work_date: proposal.work_date,
            working_interval_id: proposal.working_interval_id,
            proposed_start: proposal.start_time,
            proposed_end: proposal.end_time,
            reason: proposal.reason.clone(),
            affected_doctor_ids,
            decisions,
            status: RequestStatus::Pending,
            idempotency_key,
            created_at,
        }
    }

    pub fn approve(&mut self, doctor_id: Uuid) -> Result<DecisionOutcome, ScheduleError> {
        self.record_decision(doctor_id, Decision::Approved)
    }

    pub fn reject(&mut self, doctor_id: Uuid) -> Result<DecisionOutcome, ScheduleError> {
        self.record_decision(doctor_id, Decision::Rejected)
    }

    fn record_decision(
        &mut self,
        doctor_id: Uuid,
        decision: Decision,
    ) -> Result<DecisionOutcome, ScheduleError> {
        let entry = self
            .decisions
            .iter()
            .find(|d| d.doctor_id == doctor_id)
            .ok_or(ScheduleError::NotAffected(doctor_id))?;

        if entry.decision == decision {
            return Ok(DecisionOutcome::Unchanged);
        }
        if self.status != RequestStatus::Pending {
            return Err(ScheduleError::NotPending(self.status));
        }
        if entry.decision != Decision::Pending {
            return Err(ScheduleError::DecisionAlreadyMade(doctor_id));
        }

        if let Some(entry) = self.decisions.iter_mut().find(|d| d.doctor_id == doctor_id) {
            entry.decision = decision;
        }
        self.status = self.derived_status();
        Ok(DecisionOutcome::Recorded)
    }

    fn derived_status(&self) -> RequestStatus {
        if self.decisions.iter().any(|d| d.decision == Decision::Rejected) {
            RequestStatus::Rejected
        } else if self.decisions.iter().all(|d| d.decision == Decision::Approved) {
            RequestStatus::Approved
        } else {
            RequestStatus::Pending
        }
    }

    pub fn mark_applied(&mut self) -> Result<(), ScheduleError> {
        if self.status != RequestStatus::Approved {
            return Err(ScheduleError::NotPending(self.status));
        }
        self.status = RequestStatus::Applied;
        Ok(())
    }

    pub fn pending_doctors(&self) -> Vec<Uuid> {
        self.decisions
            .iter()
            .filter(|d| d.decision == Decision::Pending)
            .map(|d| d.doctor_id)
            .collect()
    }
}

/// Another doctor's interval that the proposed range overlaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlapWarning {
    pub doctor_id: Uuid,
    #[serde(default)]
    pub working_interval_id: Option<Uuid>,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// A booking that would fall outside the doctor's hours once the change applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedAppointment {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleChangePlan {
    pub request: ScheduleChangeRequest,
    pub overlap_warnings: Vec<OverlapWarning>,
    pub affected_appointments: Vec<AffectedAppointment>,
}

/// Body of the preview and submit endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeRequestInput {
    #[serde(flatten)]
    pub proposal: ScheduleChangeProposal,
    /// Doctors of the affected department whose schedules are checked.
    #[serde(default)]
    pub department_doctor_ids: Vec<Uuid>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkChangeRequestInput {
    pub requests: Vec<ChangeRequestInput>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("Invalid working interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid schedule change: {0}")]
    InvalidProposal(String),

    #[error("Working interval not found: {0}")]
    IntervalNotFound(Uuid),

    #[error("Doctor {0} is not part of this schedule change")]
    NotAffected(Uuid),

    #[error("Doctor {0} has already decided on this schedule change")]
    DecisionAlreadyMade(Uuid),

    #[error("Schedule change is no longer pending: {0}")]
    NotPending(RequestStatus),

    #[error("Schedule change request has no id")]
    MissingRequestId,

    #[error("Booking backend error: {0}")]
    Backend(#[from] BackendError),
}

impl From<ScheduleError> for AppError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidInterval(_)
            | ScheduleError::InvalidProposal(_)
            | ScheduleError::MissingRequestId => AppError::ValidationError(err.to_string()),
            ScheduleError::IntervalNotFound(_) => AppError::NotFound(err.to_string()),
            ScheduleError::NotAffected(_) => AppError::Forbidden(err.to_string()),
            ScheduleError::DecisionAlreadyMade(_) | ScheduleError::NotPending(_) => {
                AppError::Conflict(err.to_string())
            }
            ScheduleError::Backend(inner) => inner.into(),
        }
    }
}
