// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_backend::{BookingApiClient, SessionContext};
use shared_config::AppConfig;
use shared_models::booking::{doctor_booked_ranges, patient_booked_ranges, Appointment, BookedRange};
use shared_models::time::TimeRange;

use crate::models::{AppointmentError, ConflictCheck};

/// Ids of non-cancelled bookings on `date` overlapping `range`, minus `exclude_ids`.
pub fn conflicting_ids(
    date: NaiveDate,
    range: TimeRange,
    booked: &[BookedRange],
    exclude_ids: &[Uuid],
) -> Vec<Uuid> {
    booked
        .iter()
        .filter(|b| b.date == date)
        .filter(|b| !b.status.is_cancelled())
        .filter(|b| !exclude_ids.contains(&b.id))
        .filter(|b| b.range.overlaps(&range))
        .map(|b| b.id)
        .collect()
}

pub fn has_conflict(date: NaiveDate, range: TimeRange, booked: &[BookedRange], exclude_ids: &[Uuid]) -> bool {
    !conflicting_ids(date, range, booked, exclude_ids).is_empty()
}

/// A start strictly before `now` is rejected before any overlap is considered.
pub fn check_candidate(
    date: NaiveDate,
    range: TimeRange,
    booked: &[BookedRange],
    exclude_ids: &[Uuid],
    now: NaiveDateTime,
) -> ConflictCheck {
    if date.and_time(range.start) < now {
        return ConflictCheck::InPast;
    }

    let ids = conflicting_ids(date, range, booked, exclude_ids);
    if ids.is_empty() {
        ConflictCheck::Bookable
    } else {
        debug!("Candidate {} {}-{} overlaps {} bookings", date, range.start, range.end, ids.len());
        ConflictCheck::Conflicts { appointment_ids: ids }
    }
}

pub struct ConflictService {
    client: BookingApiClient,
}

impl ConflictService {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionContext>) -> Self {
        Self {
            client: BookingApiClient::new(config, session),
        }
    }

    pub async fn get_patient_appointments(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments: Vec<Appointment> = self
            .client
            .get(&format!("/appointments/date/{}", date))
            .await?;

        Ok(appointments
            .into_iter()
            .filter(|a| a.patient_id == patient_id)
            .collect())
    }

    pub async fn get_doctor_appointments(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments: Vec<Appointment> = self
            .client
            .get(&format!("/appointments/doctor/{}/date/{}", doctor_id, date))
            .await?;
        Ok(appointments)
    }

    pub async fn check_patient(
        &self,
        patient_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
        exclude_ids: &[Uuid],
        now: NaiveDateTime,
    ) -> Result<ConflictCheck, AppointmentError> {
        debug!("Checking conflicts for patient {} on {}", patient_id, date);

        let appointments = self.get_patient_appointments(patient_id, date).await?;
        let result = check_candidate(date, range, &patient_booked_ranges(&appointments), exclude_ids, now);

        if let ConflictCheck::Conflicts { appointment_ids } = &result {
            warn!(
                "Conflict detected for patient {} - {} conflicting appointments",
                patient_id,
                appointment_ids.len()
            );
        }
        Ok(result)
    }

    pub async fn check_doctor(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        range: TimeRange,
        exclude_ids: &[Uuid],
        now: NaiveDateTime,
    ) -> Result<ConflictCheck, AppointmentError> {
        debug!("Checking conflicts for doctor {} on {}", doctor_id, date);

        let appointments = self.get_doctor_appointments(doctor_id, date).await?;
        let booked = doctor_booked_ranges(&appointments, doctor_id);
        let result = check_candidate(date, range, &booked, exclude_ids, now);

        if let ConflictCheck::Conflicts { appointment_ids } = &result {
            warn!(
                "Conflict detected for doctor {} - {} conflicting appointments",
                doctor_id,
                appointment_ids.len()
            );
        }
        Ok(result)
    }
}
