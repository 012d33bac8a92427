// libs/appointment-cell/src/services/reschedule.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use futures::future::join_all;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use schedule_cell::AvailabilityService;
use shared_backend::{BookingApiClient, IdempotencyKey, SessionContext};
use shared_config::{AppConfig, BookingPolicy};
use shared_models::auth::User;
use shared_models::booking::{doctor_booked_ranges, patient_booked_ranges, Appointment};
use shared_models::time::{format_hms, TimeRange};

use crate::models::{
    ensure_can_modify, AppointmentError, AppointmentTimeUpdate, ConflictCheck, RescheduleOutcome,
    RescheduleRequest, Timeline, TimelineService,
};
use crate::services::conflict::{check_candidate, ConflictService};
use crate::services::timeline::build_timeline;

/// The timeline an appointment would get if moved to `request`, before any backend check.
pub fn plan_timeline(
    appointment: &Appointment,
    request: &RescheduleRequest,
    policy: &BookingPolicy,
    now: NaiveDateTime,
) -> Result<Timeline, AppointmentError> {
    if !appointment.status.is_modifiable() {
        return Err(AppointmentError::NotModifiable(appointment.status));
    }

    let services: Vec<TimelineService> = appointment
        .service_appointments
        .iter()
        .filter(|s| !s.status.is_cancelled())
        .map(TimelineService::from)
        .collect();

    let timeline = build_timeline(request.start_time, &services, policy);
    if timeline.ends_next_day {
        return Err(AppointmentError::EndsNextDay);
    }
    if request.date.and_time(timeline.start_time()) < now {
        return Err(AppointmentError::InPast);
    }

    Ok(timeline)
}

/// Ranges each doctor would be busy for; services without a doctor are skipped.
fn doctor_ranges(appointment: &Appointment, timeline: &Timeline) -> BTreeMap<Uuid, Vec<TimeRange>> {
    let mut by_doctor: BTreeMap<Uuid, Vec<TimeRange>> = BTreeMap::new();

    for segment in &timeline.segments {
        let doctor_id = appointment
            .service_appointments
            .iter()
            .find(|s| Some(s.id) == segment.appointment_id)
            .and_then(|s| s.doctor_id);
        if let Some(doctor_id) = doctor_id {
            by_doctor.entry(doctor_id).or_default().push(segment.range());
        }
    }
    if let Some(doctor_id) = appointment.doctor_id {
        by_doctor
            .entry(doctor_id)
            .or_default()
            .push(timeline.consultation.range());
    }

    by_doctor
}

pub struct RescheduleService {
    client: BookingApiClient,
    conflicts: ConflictService,
    availability: AvailabilityService,
    policy: BookingPolicy,
}

impl RescheduleService {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionContext>) -> Self {
        Self {
            client: BookingApiClient::new(config, session.clone()),
            conflicts: ConflictService::new(config, session.clone()),
            availability: AvailabilityService::new(config, session),
            policy: config.policy.clone(),
        }
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);
        let appointment: Appointment = self
            .client
            .get(&format!("/appointments/{}", appointment_id))
            .await?;
        Ok(appointment)
    }

    /// Runs every check a reschedule would run, without writing anything.
    pub async fn preview(
        &self,
        appointment_id: Uuid,
        request: &RescheduleRequest,
        user: &User,
        now: NaiveDateTime,
    ) -> Result<RescheduleOutcome, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_can_modify(user, &appointment)?;

        let timeline = self.validate(&appointment, request, now).await?;

        Ok(RescheduleOutcome {
            appointment_id,
            date: request.date,
            timeline,
            applied: false,
        })
    }

    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: &RescheduleRequest,
        user: &User,
        idempotency_key: &IdempotencyKey,
        now: NaiveDateTime,
    ) -> Result<RescheduleOutcome, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_can_modify(user, &appointment)?;

        let timeline = self.validate(&appointment, request, now).await?;

        // Service segments first, parent last. No rollback: a retry with the
        // same key resumes where this stopped.
        let mut moved = Vec::new();
        for segment in &timeline.segments {
            let Some(service_id) = segment.appointment_id else {
                continue;
            };
            let update = AppointmentTimeUpdate {
                date: request.date,
                start_time: segment.start_time,
                end_time: segment.end_time,
            };
            let _: Value = self
                .client
                .put(
                    &format!("/appointments/{}", service_id),
                    &update,
                    &idempotency_key.scoped(&service_id.to_string()),
                )
                .await
                .map_err(|e| {
                    error!(
                        "Reschedule of {} stopped at service {}, already moved: {:?}",
                        appointment_id, service_id, moved
                    );
                    e
                })?;
            moved.push(service_id);
        }

        let update = AppointmentTimeUpdate {
            date: request.date,
            start_time: timeline.consultation.start_time,
            end_time: timeline.consultation.end_time,
        };
        let _: Value = self
            .client
            .put(
                &format!("/appointments/{}", appointment_id),
                &update,
                &idempotency_key.scoped("consultation"),
            )
            .await
            .map_err(|e| {
                error!(
                    "Reschedule of {} failed on the consultation, already moved: {:?}",
                    appointment_id, moved
                );
                e
            })?;

        info!(
            "Appointment {} moved to {} {} ({} segments)",
            appointment_id,
            request.date,
            format_hms(timeline.start_time()),
            timeline.segments.len() + 1
        );

        Ok(RescheduleOutcome {
            appointment_id,
            date: request.date,
            timeline,
            applied: true,
        })
    }

    async fn validate(
        &self,
        appointment: &Appointment,
        request: &RescheduleRequest,
        now: NaiveDateTime,
    ) -> Result<Timeline, AppointmentError> {
        let timeline = plan_timeline(appointment, request, &self.policy, now)?;

        if let Some(doctor_id) = appointment.doctor_id {
            let working = self
                .availability
                .is_within_working_hours(doctor_id, request.date, timeline.consultation.range())
                .await?;
            if !working {
                warn!("Doctor {} is not working at {} {}", doctor_id, request.date, timeline.consultation.start_time);
                return Err(AppointmentError::OutsideWorkingHours);
            }
        }

        let exclude = appointment.family_ids();
        let by_doctor = doctor_ranges(appointment, &timeline);

        let doctor_lookups = join_all(by_doctor.keys().map(|doctor_id| {
            self.conflicts.get_doctor_appointments(*doctor_id, request.date)
        }))
        .await;
        let patient_appointments = self
            .conflicts
            .get_patient_appointments(appointment.patient_id, request.date)
            .await?;

        let mut checks = Vec::new();
        for ((doctor_id, ranges), lookup) in by_doctor.iter().zip(doctor_lookups) {
            let booked = doctor_booked_ranges(&lookup?, *doctor_id);
            for range in ranges {
                checks.push(check_candidate(request.date, *range, &booked, &exclude, now));
            }
        }

        let patient_booked = patient_booked_ranges(&patient_appointments);
        for segment in timeline.all_segments() {
            checks.push(check_candidate(request.date, segment.range(), &patient_booked, &exclude, now));
        }

        let mut conflicting = BTreeSet::new();
        for check in checks {
            match check {
                ConflictCheck::Bookable => {}
                ConflictCheck::InPast => return Err(AppointmentError::InPast),
                ConflictCheck::Conflicts { appointment_ids } => conflicting.extend(appointment_ids),
            }
        }

        if !conflicting.is_empty() {
            warn!(
                "Reschedule of {} blocked by {} conflicting bookings",
                appointment.id,
                conflicting.len()
            );
            return Err(AppointmentError::ConflictDetected(conflicting.into_iter().collect()));
        }

        Ok(timeline)
    }
}
