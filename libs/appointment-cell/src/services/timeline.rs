// libs/appointment-cell/src/services/timeline.rs
//! Lays a visit out back to back: services in their stored order, one buffer,
//! then the consultation.

use chrono::{Duration, NaiveTime, Timelike};
use tracing::debug;

use shared_config::BookingPolicy;
use shared_models::booking::MedicalExamination;

use crate::models::{Timeline, TimelineSegment, TimelineService};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Sum of examination durations; a service without examinations counts as one.
pub fn service_duration(examinations: &[MedicalExamination], policy: &BookingPolicy) -> i64 {
    let default = policy.default_examination_minutes;
    if examinations.is_empty() {
        return default;
    }

    examinations
        .iter()
        .map(|e| e.duration_minutes.filter(|m| *m > 0).unwrap_or(default))
        .sum()
}

fn offset(start: NaiveTime, minutes: i64) -> NaiveTime {
    start.overflowing_add_signed(Duration::minutes(minutes)).0
}

pub fn build_timeline(start: NaiveTime, services: &[TimelineService], policy: &BookingPolicy) -> Timeline {
    let mut cursor = 0;
    let mut segments = Vec::with_capacity(services.len());

    for service in services {
        let duration = service_duration(&service.medical_examinations, policy);
        segments.push(TimelineSegment {
            appointment_id: service.id,
            start_time: offset(start, cursor),
            end_time: offset(start, cursor + duration),
            duration_minutes: duration,
        });
        cursor += duration;
    }

    if !segments.is_empty() {
        cursor += policy.service_buffer_minutes;
    }

    let consultation = TimelineSegment {
        appointment_id: None,
        start_time: offset(start, cursor),
        end_time: offset(start, cursor + policy.consultation_minutes),
        duration_minutes: policy.consultation_minutes,
    };
    cursor += policy.consultation_minutes;

    let ends_next_day = i64::from(start.num_seconds_from_midnight()) + cursor * 60 >= SECONDS_PER_DAY;
    debug!(
        "Built timeline from {} with {} services, {} minutes total",
        start,
        segments.len(),
        cursor
    );

    Timeline {
        segments,
        consultation,
        total_minutes: cursor,
        ends_next_day,
    }
}
