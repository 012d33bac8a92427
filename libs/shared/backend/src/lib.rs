pub mod client;
pub mod error;
pub mod idempotency;
pub mod session;

pub use client::BookingApiClient;
pub use error::BackendError;
pub use idempotency::IdempotencyKey;
pub use session::{BearerSession, SessionContext};
