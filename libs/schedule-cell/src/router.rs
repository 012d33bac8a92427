use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppConfig>) -> Router {
    let protected_routes = Router::new()
        // Slot lookups
        .route("/{doctor_id}/slots", get(handlers::get_available_slots))
        .route("/slots/bulk", post(handlers::get_bulk_slots))

        // Schedule change requests
        .route("/change-requests/preview", post(handlers::preview_change_request))
        .route("/change-requests", post(handlers::submit_change_request))
        .route("/change-requests/bulk", post(handlers::submit_bulk_change_requests))
        .route("/change-requests/{request_id}/approve", post(handlers::approve_change_request))
        .route("/change-requests/{request_id}/reject", post(handlers::reject_change_request))

        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .merge(protected_routes)
        .with_state(state)
}
