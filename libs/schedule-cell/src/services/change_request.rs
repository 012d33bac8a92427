// libs/schedule-cell/src/services/change_request.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_backend::{BookingApiClient, IdempotencyKey, SessionContext};
use shared_config::{AppConfig, BookingPolicy};
use shared_models::booking::{Appointment, WorkingInterval};
use shared_models::time::TimeRange;

use crate::models::{
    AffectedAppointment, ChangeRequestInput, ChangeType, DecisionOutcome, OverlapWarning,
    ScheduleChangePlan, ScheduleChangeProposal, ScheduleChangeRequest, ScheduleError,
};
use crate::services::availability::{effective_intervals, week_bounds, AvailabilityService};

// ==============================================================================
// PLANNING
// ==============================================================================

/// Builds a pending change request together with everything staff must see
/// before submitting it.
///
/// `department_intervals` are the known working intervals of every doctor in
/// the department, the target included, on any date. `target_appointments` are
/// the target doctor's bookings in the ISO week of the proposal's date, since
/// adding or removing the week's only interval switches the default window
/// for every day of that week.
pub fn plan_change(
    proposal: &ScheduleChangeProposal,
    staff_id: Uuid,
    department_intervals: &[WorkingInterval],
    target_appointments: &[Appointment],
    policy: &BookingPolicy,
    idempotency_key: IdempotencyKey,
    now: NaiveDateTime,
) -> Result<ScheduleChangePlan, ScheduleError> {
    proposal.validate()?;

    let target = proposal.target_doctor_id;
    let on_date: Vec<&WorkingInterval> = department_intervals
        .iter()
        .filter(|i| i.work_date == proposal.work_date)
        .collect();

    let target_intervals: Vec<&WorkingInterval> = on_date
        .iter()
        .copied()
        .filter(|i| i.doctor_id == target)
        .collect();

    if let Some(interval_id) = proposal.working_interval_id {
        if !target_intervals.iter().any(|i| i.id == Some(interval_id)) {
            return Err(ScheduleError::IntervalNotFound(interval_id));
        }
    }

    let proposed = match proposal.change_type {
        ChangeType::Delete => None,
        ChangeType::Create | ChangeType::Update => Some(proposal.proposed_range()?),
    };

    // A doctor's own intervals must stay disjoint.
    if let Some(range) = proposed {
        let clashes_with_own = target_intervals
            .iter()
            .filter(|i| proposal.change_type == ChangeType::Create || i.id != proposal.working_interval_id)
            .any(|i| i.range().overlaps(&range));
        if clashes_with_own {
            return Err(ScheduleError::InvalidInterval(
                "Interval overlaps another interval of the same doctor".to_string(),
            ));
        }
    }

    let overlap_warnings = proposed
        .map(|range| overlap_warnings(&on_date, target, range))
        .unwrap_or_default();

    let before: Vec<WorkingInterval> = department_intervals
        .iter()
        .filter(|i| i.doctor_id == target)
        .cloned()
        .collect();
    let after = schedule_after_change(&before, proposal, proposed);
    let affected_appointments = orphaned_appointments(target_appointments, proposal, &before, &after, policy);

    let mut affected: BTreeSet<Uuid> = on_date.iter().map(|i| i.doctor_id).collect();
    affected.insert(target);

    if !overlap_warnings.is_empty() {
        warn!(
            "Schedule change for doctor {} overlaps {} interval(s) of other doctors",
            target,
            overlap_warnings.len()
        );
    }
    if !affected_appointments.is_empty() {
        warn!(
            "Schedule change for doctor {} would orphan {} appointment(s)",
            target,
            affected_appointments.len()
        );
    }

    Ok(ScheduleChangePlan {
        request: ScheduleChangeRequest::new(proposal, staff_id, affected, idempotency_key, now),
        overlap_warnings,
        affected_appointments,
    })
}

fn overlap_warnings(on_date: &[&WorkingInterval], target: Uuid, range: TimeRange) -> Vec<OverlapWarning> {
    on_date
        .iter()
        .filter(|i| i.doctor_id != target && i.range().overlaps(&range))
        .map(|i| OverlapWarning {
            doctor_id: i.doctor_id,
            working_interval_id: i.id,
            start_time: i.start_time,
            end_time: i.end_time,
        })
        .collect()
}

/// The target doctor's explicit schedule once the proposal is applied.
fn schedule_after_change(
    schedule: &[WorkingInterval],
    proposal: &ScheduleChangeProposal,
    proposed: Option<TimeRange>,
) -> Vec<WorkingInterval> {
    let mut after: Vec<WorkingInterval> = schedule
        .iter()
        .filter(|i| match proposal.change_type {
            ChangeType::Create => true,
            ChangeType::Update | ChangeType::Delete => i.id != proposal.working_interval_id,
        })
        .cloned()
        .collect();

    if let Some(range) = proposed {
        after.push(WorkingInterval {
            id: match proposal.change_type {
                ChangeType::Create => None,
                ChangeType::Update | ChangeType::Delete => proposal.working_interval_id,
            },
            doctor_id: proposal.target_doctor_id,
            work_date: proposal.work_date,
            start_time: range.start,
            end_time: range.end,
        });
    }
    after
}

fn is_covered(schedule: &[WorkingInterval], appointment: &Appointment, doctor_id: Uuid, policy: &BookingPolicy) -> bool {
    effective_intervals(schedule, doctor_id, appointment.date, policy)
        .iter()
        .any(|i| i.range().contains(&appointment.range()))
}

/// Bookings in the proposal's week that the doctor's hours cover now but
/// would no longer cover, default window included on both sides.
fn orphaned_appointments(
    appointments: &[Appointment],
    proposal: &ScheduleChangeProposal,
    before: &[WorkingInterval],
    after: &[WorkingInterval],
    policy: &BookingPolicy,
) -> Vec<AffectedAppointment> {
    let target = proposal.target_doctor_id;
    let (monday, sunday) = week_bounds(proposal.work_date);

    appointments
        .iter()
        .filter(|a| a.is_active() && a.doctor_id == Some(target))
        .filter(|a| a.date >= monday && a.date <= sunday)
        .filter(|a| is_covered(before, a, target, policy) && !is_covered(after, a, target, policy))
        .map(|a| AffectedAppointment {
            appointment_id: a.id,
            patient_id: a.patient_id,
            date: a.date,
            start_time: a.start_time,
            end_time: a.end_time,
        })
        .collect()
}

// ==============================================================================
// SERVICE
// ==============================================================================

pub struct ScheduleChangeService {
    client: BookingApiClient,
    availability: AvailabilityService,
    policy: BookingPolicy,
}

impl ScheduleChangeService {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionContext>) -> Self {
        Self {
            client: BookingApiClient::new(config, session.clone()),
            availability: AvailabilityService::new(config, session),
            policy: config.policy.clone(),
        }
    }

    /// The target doctor's bookings for each day of the week containing `date`.
    async fn get_week_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let (monday, _) = week_bounds(date);
        let lookups = join_all((0..7).map(|offset| {
            self.availability
                .get_doctor_appointments(doctor_id, monday + Duration::days(offset))
        }))
        .await;

        let mut appointments = Vec::new();
        for lookup in lookups {
            appointments.extend(lookup?);
        }
        Ok(appointments)
    }

    /// Collects the department's schedules and the target's week of bookings, then plans.
    pub async fn preview(
        &self,
        input: &ChangeRequestInput,
        staff_id: Uuid,
        idempotency_key: IdempotencyKey,
        now: NaiveDateTime,
    ) -> Result<ScheduleChangePlan, ScheduleError> {
        let proposal = &input.proposal;
        proposal.validate()?;

        let mut doctors: BTreeSet<Uuid> = input.department_doctor_ids.iter().copied().collect();
        doctors.insert(proposal.target_doctor_id);
        debug!(
            "Previewing {:?} change for doctor {} against {} department doctors",
            proposal.change_type,
            proposal.target_doctor_id,
            doctors.len()
        );

        let schedules = join_all(doctors.iter().map(|doctor_id| async move {
            (*doctor_id, self.availability.get_doctor_schedule(*doctor_id).await)
        }))
        .await;

        let mut by_doctor: BTreeMap<Uuid, Vec<WorkingInterval>> = BTreeMap::new();
        for (doctor_id, schedule) in schedules {
            by_doctor.insert(doctor_id, schedule?);
        }
        let department_intervals: Vec<WorkingInterval> = by_doctor.into_values().flatten().collect();

        let appointments = self
            .get_week_appointments(proposal.target_doctor_id, proposal.work_date)
            .await?;

        plan_change(
            proposal,
            staff_id,
            &department_intervals,
            &appointments,
            &self.policy,
            idempotency_key,
            now,
        )
    }

    pub async fn submit(
        &self,
        input: &ChangeRequestInput,
        staff_id: Uuid,
        idempotency_key: IdempotencyKey,
        now: NaiveDateTime,
    ) -> Result<ScheduleChangePlan, ScheduleError> {
        let mut plan = self.preview(input, staff_id, idempotency_key.clone(), now).await?;

        let created: ScheduleChangeRequest = self
            .client
            .post("/schedule-change-requests", Some(&plan.request), &idempotency_key)
            .await?;

        info!(
            "Submitted schedule change {:?} for doctor {} awaiting {} approvals",
            created.id,
            created.target_doctor_id,
            created.affected_doctor_ids.len()
        );
        plan.request = created;
        Ok(plan)
    }

    /// Plans every request first; nothing is sent unless all of them are valid.
    pub async fn submit_bulk(
        &self,
        inputs: &[ChangeRequestInput],
        staff_id: Uuid,
        idempotency_key: IdempotencyKey,
        now: NaiveDateTime,
    ) -> Result<Vec<ScheduleChangePlan>, ScheduleError> {
        let mut plans = Vec::with_capacity(inputs.len());
        for (index, input) in inputs.iter().enumerate() {
            let key = match input.idempotency_key.as_deref() {
                Some(own) if !own.trim().is_empty() => IdempotencyKey::from_client(Some(own)),
                _ => idempotency_key.scoped(&index.to_string()),
            };
            plans.push(self.preview(input, staff_id, key, now).await?);
        }

        let requests: Vec<&ScheduleChangeRequest> = plans.iter().map(|p| &p.request).collect();
        let created: Vec<ScheduleChangeRequest> = self
            .client
            .post("/schedule-change-requests/bulk", Some(&requests), &idempotency_key)
            .await?;

        info!("Submitted {} schedule changes in bulk", created.len());
        for (plan, request) in plans.iter_mut().zip(created) {
            plan.request = request;
        }
        Ok(plans)
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<ScheduleChangeRequest, ScheduleError> {
        let request: ScheduleChangeRequest = self
            .client
            .get(&format!("/schedule-change-requests/{}", request_id))
            .await?;
        Ok(request)
    }

    pub async fn approve(
        &self,
        request_id: Uuid,
        doctor_id: Uuid,
        idempotency_key: IdempotencyKey,
    ) -> Result<ScheduleChangeRequest, ScheduleError> {
        self.decide(request_id, doctor_id, true, idempotency_key).await
    }

    pub async fn reject(
        &self,
        request_id: Uuid,
        doctor_id: Uuid,
        idempotency_key: IdempotencyKey,
    ) -> Result<ScheduleChangeRequest, ScheduleError> {
        self.decide(request_id, doctor_id, false, idempotency_key).await
    }

    async fn decide(
        &self,
        request_id: Uuid,
        doctor_id: Uuid,
        approve: bool,
        idempotency_key: IdempotencyKey,
    ) -> Result<ScheduleChangeRequest, ScheduleError> {
        let mut request = self.get_request(request_id).await?;

        let outcome = if approve {
            request.approve(doctor_id)?
        } else {
            request.reject(doctor_id)?
        };

        if outcome == DecisionOutcome::Unchanged {
            debug!("Doctor {} repeated the same decision on {}, nothing to send", doctor_id, request_id);
            return Ok(request);
        }

        let action = if approve { "approve" } else { "reject" };
        let path = format!("/schedule-change-requests/{}/{}/doctor/{}", request_id, action, doctor_id);
        let response: Value = self.client.post::<Value, ()>(&path, None, &idempotency_key).await?;

        info!("Doctor {} chose to {} schedule change {}", doctor_id, action, request_id);

        // Prefer the backend's view when it returns the updated request.
        if response.is_null() {
            return Ok(request);
        }
        match serde_json::from_value::<ScheduleChangeRequest>(response) {
            Ok(updated) => Ok(updated),
            Err(e) => {
                warn!(
                    "Could not decode backend view of schedule change {}, keeping local state: {}",
                    request_id, e
                );
                Ok(request)
            }
        }
    }
}
