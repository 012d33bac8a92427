//! Records exchanged with the booking backend.
//!
//! Field names follow the backend's camelCase JSON; dates are `YYYY-MM-DD` and
//! times `HH:MM:SS` with no timezone.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::time::TimeRange;

// ==============================================================================
// SCHEDULES
// ==============================================================================

/// One contiguous block a doctor is available on a calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingInterval {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub doctor_id: Uuid,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl WorkingInterval {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

/// Row returned by `GET /schedule/{doctorId}`; the doctor is implied by the path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub work_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl ScheduleEntry {
    pub fn into_interval(self, doctor_id: Uuid) -> WorkingInterval {
        WorkingInterval {
            id: self.id,
            doctor_id,
            work_date: self.work_date,
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "confirmed")]
    Confirmed,
    #[serde(alias = "in_progress")]
    InProgress,
    #[serde(alias = "completed")]
    Completed,
    #[serde(alias = "cancelled", alias = "CANCELED", alias = "canceled")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled)
    }

    /// Whether the booking can still be moved or cancelled.
    pub fn is_modifiable(&self) -> bool {
        matches!(self, AppointmentStatus::Pending | AppointmentStatus::Confirmed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "PENDING"),
            AppointmentStatus::Confirmed => write!(f, "CONFIRMED"),
            AppointmentStatus::InProgress => write!(f, "IN_PROGRESS"),
            AppointmentStatus::Completed => write!(f, "COMPLETED"),
            AppointmentStatus::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MedicalExamination {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
}

/// Ancillary procedure performed before its parent consultation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAppointment {
    pub id: Uuid,
    pub parent_appointment_id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub medical_examinations: Vec<MedicalExamination>,
}

impl ServiceAppointment {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    #[serde(default)]
    pub doctor_id: Option<Uuid>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub service_appointments: Vec<ServiceAppointment>,
    #[serde(default)]
    pub deposit: Option<i64>,
    #[serde(default)]
    pub cancel_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub removed_by_schedule_change: bool,
}

impl Appointment {
    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.start_time, self.end_time)
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_cancelled()
    }

    /// Ids of this appointment and every service chained to it.
    pub fn family_ids(&self) -> Vec<Uuid> {
        std::iter::once(self.id)
            .chain(self.service_appointments.iter().map(|s| s.id))
            .collect()
    }

    /// Every range of this booking the patient is busy for, services included.
    pub fn patient_ranges(&self) -> impl Iterator<Item = BookedRange> + '_ {
        std::iter::once(BookedRange::from(self))
            .chain(self.service_appointments.iter().map(BookedRange::from))
    }

    /// Ranges of this booking that hold `doctor_id`'s time.
    ///
    /// The parent counts when it names this doctor or none at all, since the
    /// doctor feed is already scoped to one doctor. A service counts only when
    /// the doctor performs it.
    pub fn doctor_ranges(&self, doctor_id: Uuid) -> impl Iterator<Item = BookedRange> + '_ {
        let parent = self
            .doctor_id
            .map_or(true, |id| id == doctor_id)
            .then(|| BookedRange::from(self));

        parent.into_iter().chain(
            self.service_appointments
                .iter()
                .filter(move |s| s.doctor_id == Some(doctor_id))
                .map(BookedRange::from),
        )
    }
}

/// Ranges in `appointments` that hold `doctor_id`'s time.
///
/// Slot generation and doctor conflict checks both read busy time through
/// this, so a slot shown as free is one a booking can take.
pub fn doctor_booked_ranges(appointments: &[Appointment], doctor_id: Uuid) -> Vec<BookedRange> {
    appointments
        .iter()
        .flat_map(|appointment| appointment.doctor_ranges(doctor_id))
        .collect()
}

/// Ranges in `appointments` that hold their patients' time.
pub fn patient_booked_ranges(appointments: &[Appointment]) -> Vec<BookedRange> {
    appointments
        .iter()
        .flat_map(Appointment::patient_ranges)
        .collect()
}

/// Date, time range and id of any booked record, parent or service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedRange {
    pub id: Uuid,
    pub date: NaiveDate,
    pub range: TimeRange,
    pub status: AppointmentStatus,
}

impl From<&Appointment> for BookedRange {
    fn from(appointment: &Appointment) -> Self {
        Self {
            id: appointment.id,
            date: appointment.date,
            range: appointment.range(),
            status: appointment.status,
        }
    }
}

impl From<&ServiceAppointment> for BookedRange {
    fn from(service: &ServiceAppointment) -> Self {
        Self {
            id: service.id,
            date: service.date,
            range: service.range(),
            status: service.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn appointment_parses_backend_shape() {
        let raw = json!({
            "id": "7b0c8d1e-3c6f-4e0a-9a55-1c2d3e4f5a6b",
            "patientId": "a3f1c2d4-5b6e-4f70-8a91-b2c3d4e5f607",
            "doctorId": null,
            "date": "2025-03-10",
            "startTime": "09:00:00",
            "endTime": "09:10:00",
            "status": "cancelled",
            "deposit": 200000,
            "cancelTime": "2025-03-09T18:30:00"
        });

        let appointment: Appointment = serde_json::from_value(raw).unwrap();
        assert_eq!(appointment.doctor_id, None);
        assert_eq!(appointment.status, AppointmentStatus::Cancelled);
        assert!(!appointment.is_active());
        assert!(appointment.service_appointments.is_empty());
        assert!(!appointment.removed_by_schedule_change);
        assert_eq!(appointment.range().duration_minutes(), 10);
    }

    #[test]
    fn schedule_entry_takes_doctor_from_path() {
        let doctor = Uuid::new_v4();
        let entry: ScheduleEntry = serde_json::from_value(json!({
            "workDate": "2025-03-10",
            "startTime": "07:00:00",
            "endTime": "17:00:00"
        }))
        .unwrap();

        let interval = entry.into_interval(doctor);
        assert_eq!(interval.doctor_id, doctor);
        assert_eq!(interval.range().duration_minutes(), 600);
    }

    fn parent_with_services(doctor_id: Option<Uuid>, services: Vec<Option<Uuid>>) -> Appointment {
        let id = Uuid::new_v4();
        let patient_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let at = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0).unwrap();

        Appointment {
            id,
            patient_id,
            doctor_id,
            date,
            start_time: at(10, 5),
            end_time: at(10, 15),
            status: AppointmentStatus::Confirmed,
            service_appointments: services
                .into_iter()
                .map(|service_doctor| ServiceAppointment {
                    id: Uuid::new_v4(),
                    parent_appointment_id: id,
                    patient_id,
                    doctor_id: service_doctor,
                    date,
                    start_time: at(9, 30),
                    end_time: at(10, 0),
                    status: AppointmentStatus::Confirmed,
                    medical_examinations: vec![],
                })
                .collect(),
            deposit: None,
            cancel_time: None,
            removed_by_schedule_change: false,
        }
    }

    #[test]
    fn doctor_time_skips_services_run_by_others() {
        let (doctor, radiologist) = (Uuid::new_v4(), Uuid::new_v4());
        let appointment = parent_with_services(Some(doctor), vec![None, Some(radiologist), Some(doctor)]);

        let ids: Vec<Uuid> = doctor_booked_ranges(&[appointment.clone()], doctor)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![appointment.id, appointment.service_appointments[2].id]);

        let radiology: Vec<Uuid> = doctor_booked_ranges(&[appointment.clone()], radiologist)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(radiology, vec![appointment.service_appointments[1].id]);

        assert_eq!(patient_booked_ranges(&[appointment]).len(), 4);
    }

    #[test]
    fn parent_without_doctor_belongs_to_the_queried_doctor() {
        let doctor = Uuid::new_v4();
        let appointment = parent_with_services(None, vec![None]);

        let ranges = doctor_booked_ranges(&[appointment.clone()], doctor);
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].id, appointment.id);
    }

    #[test]
    fn only_pending_and_confirmed_are_modifiable() {
        assert!(AppointmentStatus::Pending.is_modifiable());
        assert!(AppointmentStatus::Confirmed.is_modifiable());
        assert!(!AppointmentStatus::InProgress.is_modifiable());
        assert!(!AppointmentStatus::Cancelled.is_modifiable());
    }
}
