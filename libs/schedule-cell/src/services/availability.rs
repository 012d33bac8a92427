// libs/schedule-cell/src/services/availability.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Weekday};
use futures::future::join_all;
use tracing::{debug, info};
use uuid::Uuid;

use shared_backend::{BookingApiClient, SessionContext};
use shared_config::{AppConfig, BookingPolicy};
use shared_models::booking::{doctor_booked_ranges, Appointment, ScheduleEntry, WorkingInterval};
use shared_models::time::{add_minutes, quantize_up, TimeRange};

use crate::models::{DoctorSlots, ScheduleError, Slot};

// ==============================================================================
// SLOT GENERATION
// ==============================================================================

/// Monday and Sunday of the ISO week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

/// Whether the doctor has any explicit interval in the week of `date`.
pub fn week_has_schedule(all_intervals: &[WorkingInterval], doctor_id: Uuid, date: NaiveDate) -> bool {
    let (monday, sunday) = week_bounds(date);
    all_intervals
        .iter()
        .any(|i| i.doctor_id == doctor_id && i.work_date >= monday && i.work_date <= sunday)
}

/// Intervals that apply to `date` for one doctor.
///
/// The default weekday window is used only when the doctor has no explicit
/// interval anywhere in the week. One explicit interval in the week disables the
/// default for every day of that week, so days without one produce no slots.
pub fn effective_intervals(
    all_intervals: &[WorkingInterval],
    doctor_id: Uuid,
    date: NaiveDate,
    policy: &BookingPolicy,
) -> Vec<WorkingInterval> {
    if week_has_schedule(all_intervals, doctor_id, date) {
        let mut for_day: Vec<WorkingInterval> = all_intervals
            .iter()
            .filter(|i| i.doctor_id == doctor_id && i.work_date == date)
            .cloned()
            .collect();
        for_day.sort_by_key(|i| i.start_time);
        return for_day;
    }

    if matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Vec::new();
    }

    debug!("No explicit schedule for doctor {} in week of {}, using default window", doctor_id, date);
    vec![WorkingInterval {
        id: None,
        doctor_id,
        work_date: date,
        start_time: policy.default_day_start,
        end_time: policy.default_day_end,
    }]
}

/// Ordered slots covering each interval, flagged against the doctor's active bookings.
pub fn generate_slots(
    intervals: &[WorkingInterval],
    appointments: &[Appointment],
    policy: &BookingPolicy,
) -> Vec<Slot> {
    let mut seen = BTreeSet::new();
    let mut slots = Vec::new();

    for interval in intervals.iter().filter(|i| i.range().is_valid()) {
        let booked: Vec<TimeRange> = doctor_booked_ranges(appointments, interval.doctor_id)
            .into_iter()
            .filter(|b| !b.status.is_cancelled() && b.date == interval.work_date)
            .map(|b| b.range)
            .collect();

        let mut cursor = quantize_up(interval.start_time, policy.slot_minutes);
        while let Some(start) = cursor {
            let Some(end) = add_minutes(start, policy.slot_minutes) else {
                break;
            };
            if end > interval.end_time {
                break;
            }

            if seen.insert(start) {
                let range = TimeRange::new(start, end);
                slots.push(Slot {
                    start_time: start,
                    end_time: end,
                    available: !booked.iter().any(|b| b.overlaps(&range)),
                });
            }
            cursor = Some(end);
        }
    }

    slots.sort_by_key(|slot| slot.start_time);
    slots
}

/// Slots that start before `now` cannot be booked any more.
pub fn mark_past_unavailable(slots: &mut [Slot], date: NaiveDate, now: NaiveDateTime) {
    for slot in slots.iter_mut() {
        if date.and_time(slot.start_time) < now {
            slot.available = false;
        }
    }
}

// ==============================================================================
// SERVICE
// ==============================================================================

pub struct AvailabilityService {
    client: BookingApiClient,
    policy: BookingPolicy,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionContext>) -> Self {
        Self {
            client: BookingApiClient::new(config, session),
            policy: config.policy.clone(),
        }
    }

    pub async fn get_doctor_schedule(&self, doctor_id: Uuid) -> Result<Vec<WorkingInterval>, ScheduleError> {
        debug!("Fetching schedule for doctor: {}", doctor_id);

        let entries: Vec<ScheduleEntry> = self
            .client
            .get(&format!("/schedule/{}", doctor_id))
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| entry.into_interval(doctor_id))
            .collect())
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, ScheduleError> {
        let appointments: Vec<Appointment> = self
            .client
            .get(&format!("/appointments/doctor/{}/date/{}", doctor_id, date))
            .await?;
        Ok(appointments)
    }

    /// Intervals in effect for `date`, default window included.
    pub async fn get_effective_intervals(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<WorkingInterval>, ScheduleError> {
        let schedule = self.get_doctor_schedule(doctor_id).await?;
        Ok(effective_intervals(&schedule, doctor_id, date, &self.policy))
    }

    pub async fn get_available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<DoctorSlots, ScheduleError> {
        debug!("Calculating slots for doctor {} on {}", doctor_id, date);

        let (schedule, appointments) = futures::try_join!(
            self.get_doctor_schedule(doctor_id),
            self.get_doctor_appointments(doctor_id, date),
        )?;

        let intervals = effective_intervals(&schedule, doctor_id, date, &self.policy);
        let uses_default_schedule = !week_has_schedule(&schedule, doctor_id, date);

        let mut slots = generate_slots(&intervals, &appointments, &self.policy);
        mark_past_unavailable(&mut slots, date, now);

        debug!(
            "Doctor {} has {} slots on {} ({} available)",
            doctor_id,
            slots.len(),
            date,
            slots.iter().filter(|s| s.available).count()
        );

        Ok(DoctorSlots {
            doctor_id,
            date,
            uses_default_schedule,
            slots,
        })
    }

    /// Fans out one lookup per doctor; results are keyed by doctor id.
    pub async fn get_slots_for_doctors(
        &self,
        doctor_ids: &[Uuid],
        date: NaiveDate,
        now: NaiveDateTime,
    ) -> Result<BTreeMap<Uuid, DoctorSlots>, ScheduleError> {
        let unique: BTreeSet<Uuid> = doctor_ids.iter().copied().collect();
        info!("Fetching slots for {} doctors on {}", unique.len(), date);

        let lookups = unique
            .iter()
            .map(|doctor_id| self.get_available_slots(*doctor_id, date, now));

        let mut by_doctor = BTreeMap::new();
        for result in join_all(lookups).await {
            let doctor_slots = result?;
            by_doctor.insert(doctor_slots.doctor_id, doctor_slots);
        }

        Ok(by_doctor)
    }

    /// Whether `range` on `date` lies entirely inside one of the doctor's intervals.
    pub async fn is_within_working_hours(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
    ) -> Result<bool, ScheduleError> {
        let intervals = self.get_effective_intervals(doctor_id, date).await?;
        Ok(intervals.iter().any(|i| i.range().contains(&range)))
    }
}
