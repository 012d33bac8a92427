pub mod availability;
pub mod change_request;

pub use availability::AvailabilityService;
pub use change_request::ScheduleChangeService;
