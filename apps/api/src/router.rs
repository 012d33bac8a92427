use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::router::appointment_routes;
use schedule_cell::router::schedule_routes;
use shared_config::AppConfig;

pub fn create_router(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic booking policy service is running!" }))
        .nest("/schedule", schedule_routes(state.clone()))
        .nest("/appointments", appointment_routes(state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use shared_utils::test_utils::TestConfig;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_route_answers_without_token() {
        let response = create_router(TestConfig::default().to_arc())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("running"));
    }

    #[tokio::test]
    async fn cell_routes_are_nested_behind_auth() {
        let app = create_router(TestConfig::default().to_arc());

        for uri in ["/appointments/timeline", "/schedule/change-requests"] {
            let response = app
                .clone()
                .oneshot(Request::builder().method("POST").uri(uri).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        }
    }
}
