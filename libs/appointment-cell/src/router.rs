use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Extension, Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::SubmissionGuard;

pub fn appointment_routes(state: Arc<AppConfig>) -> Router {
    appointment_routes_with_guard(state, SubmissionGuard::new())
}

/// Same routes with a caller-owned guard, so tests can hold keys in flight.
pub fn appointment_routes_with_guard(state: Arc<AppConfig>, guard: SubmissionGuard) -> Router {
    let protected_routes = Router::new()
        // Policy calculations
        .route("/conflicts/check", post(handlers::check_conflicts))
        .route("/timeline", post(handlers::build_visit_timeline))
        .route("/refund/quote", post(handlers::quote_refund))

        // Changes to an existing booking
        .route("/{appointment_id}/refund", get(handlers::get_refund_quote))
        .route("/{appointment_id}/reschedule/preview", post(handlers::preview_reschedule))
        .route("/{appointment_id}/reschedule", post(handlers::reschedule_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))

        .layer(Extension(guard))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
