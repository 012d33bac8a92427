// libs/appointment-cell/src/services/submission.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use shared_backend::IdempotencyKey;

use crate::models::AppointmentError;

/// Keeps one side-effecting submission per idempotency key in flight.
///
/// Cloning shares the same in-flight set, so a single guard can be handed to
/// every request through an axum `Extension`.
#[derive(Debug, Clone, Default)]
pub struct SubmissionGuard {
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl SubmissionGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        // The set stays consistent even if a holder panicked.
        self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn begin(&self, key: &IdempotencyKey) -> Result<SubmissionTicket, AppointmentError> {
        if !self.lock().insert(key.as_str().to_string()) {
            warn!("Submission {} is already in flight", key);
            return Err(AppointmentError::AlreadyInFlight(key.to_string()));
        }

        debug!("Submission {} started", key);
        Ok(SubmissionTicket {
            guard: self.clone(),
            key: key.as_str().to_string(),
        })
    }

    pub fn is_in_flight(&self, key: &IdempotencyKey) -> bool {
        self.lock().contains(key.as_str())
    }
}

/// Releases its key when dropped, whether the submission succeeded or not.
#[derive(Debug)]
pub struct SubmissionTicket {
    guard: SubmissionGuard,
    key: String,
}

impl SubmissionTicket {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for SubmissionTicket {
    fn drop(&mut self) {
        self.guard.lock().remove(&self.key);
        debug!("Submission {} finished", self.key);
    }
}
