use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Request-scoped key sent with every mutating backend call so that a retried
/// submission is applied at most once.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Uses the caller's key when present and non-blank, otherwise generates one.
    pub fn from_client(key: Option<&str>) -> Self {
        match key.map(str::trim) {
            Some(k) if !k.is_empty() => Self(k.to_string()),
            _ => Self::generate(),
        }
    }

    /// Derives a stable sub-key for one step of a multi-request operation.
    pub fn scoped(&self, scope: &str) -> Self {
        Self(format!("{}:{}", self.0, scope))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
