// libs/appointment-cell/src/services/cancellation.rs
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_backend::{BookingApiClient, IdempotencyKey, SessionContext};
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::booking::{Appointment, AppointmentStatus};

use crate::models::{
    ensure_can_modify, AppointmentError, CancellationOutcome, CancellationUpdate, RefundQuote, RefundUpdate,
};
use crate::services::refund::evaluate_refund;

/// Refund owed if `appointment` were cancelled on `today`.
pub fn quote_for(appointment: &Appointment, today: NaiveDate) -> RefundQuote {
    evaluate_refund(
        appointment.deposit.unwrap_or(0),
        today,
        appointment.date,
        appointment.removed_by_schedule_change,
    )
}

pub struct CancellationService {
    client: BookingApiClient,
}

impl CancellationService {
    pub fn new(config: &AppConfig, session: Arc<dyn SessionContext>) -> Self {
        Self {
            client: BookingApiClient::new(config, session),
        }
    }

    async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let appointment: Appointment = self
            .client
            .get(&format!("/appointments/{}", appointment_id))
            .await?;
        Ok(appointment)
    }

    pub async fn quote(&self, appointment_id: Uuid, user: &User, today: NaiveDate) -> Result<RefundQuote, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_can_modify(user, &appointment)?;
        Ok(quote_for(&appointment, today))
    }

    /// Marks the booking and its services cancelled, then records the refund.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        user: &User,
        idempotency_key: &IdempotencyKey,
        now: NaiveDateTime,
    ) -> Result<CancellationOutcome, AppointmentError> {
        let appointment = self.get_appointment(appointment_id).await?;
        ensure_can_modify(user, &appointment)?;

        if appointment.status.is_cancelled() {
            return Err(AppointmentError::AlreadyCancelled(appointment_id));
        }
        if !appointment.status.is_modifiable() {
            return Err(AppointmentError::NotModifiable(appointment.status));
        }

        let refund = quote_for(&appointment, now.date());
        let update = CancellationUpdate {
            status: AppointmentStatus::Cancelled,
            cancel_time: now,
        };

        // No rollback: a retry with the same key resumes where this stopped.
        let mut cancelled_ids = Vec::new();
        for service in appointment.service_appointments.iter().filter(|s| !s.status.is_cancelled()) {
            debug!("Cancelling service appointment {} of {}", service.id, appointment_id);
            let _: Value = self
                .client
                .put(
                    &format!("/appointments/{}", service.id),
                    &update,
                    &idempotency_key.scoped(&service.id.to_string()),
                )
                .await
                .map_err(|e| {
                    error!(
                        "Cancel of {} stopped at service {}, already cancelled: {:?}",
                        appointment_id, service.id, cancelled_ids
                    );
                    e
                })?;
            cancelled_ids.push(service.id);
        }

        let _: Value = self
            .client
            .put(
                &format!("/appointments/{}", appointment_id),
                &update,
                &idempotency_key.scoped("cancel"),
            )
            .await
            .map_err(|e| {
                error!(
                    "Cancel of {} failed on the parent, already cancelled: {:?}",
                    appointment_id, cancelled_ids
                );
                e
            })?;
        cancelled_ids.push(appointment_id);

        let _: Value = self
            .client
            .put(
                &format!("/appointments/{}/refund", appointment_id),
                &RefundUpdate::from(&refund),
                &idempotency_key.scoped("refund"),
            )
            .await
            .map_err(|e| {
                error!(
                    "Appointment {} is cancelled but its refund of {} was not recorded",
                    appointment_id, refund.refund_amount
                );
                e
            })?;

        info!(
            "Appointment {} cancelled, refund {} ({}%)",
            appointment_id, refund.refund_amount, refund.refund_percentage
        );

        Ok(CancellationOutcome {
            appointment_id,
            cancel_time: now,
            cancelled_ids,
            refund,
        })
    }
}
