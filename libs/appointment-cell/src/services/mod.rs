pub mod cancellation;
pub mod conflict;
pub mod refund;
pub mod reschedule;
pub mod submission;
pub mod timeline;

pub use cancellation::CancellationService;
pub use conflict::ConflictService;
pub use reschedule::RescheduleService;
pub use submission::{SubmissionGuard, SubmissionTicket};
