//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`. Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Templates
        .route(
            "/templates",
            post(handlers::template::create_template).get(handlers::template::list_templates),
        )
        .route(
            "/templates/{id}",
            get(handlers::template::get_template).put(handlers::template::update_template),
        )
        .route(
            "/templates/{id}/deactivate",
            post(handlers::template::deactivate_template),
        )
        // Instances
        .route(
            "/instances",
            post(handlers::instance::create_instance).get(handlers::instance::list_instances),
        )
        .route("/instances/awaiting", get(handlers::instance::list_awaiting))
        .route("/instances/{id}", get(handlers::instance::get_instance))
        .route(
            "/instances/{id}/payload",
            put(handlers::instance::update_draft),
        )
        .route(
            "/instances/{id}/submit",
            post(handlers::instance::submit_instance),
        )
        .route(
            "/instances/{id}/cancel",
            post(handlers::instance::cancel_instance),
        )
        .route(
            "/instances/{id}/decisions",
            post(handlers::instance::record_decision),
        )
        // Notification outbox
        .route(
            "/notifications",
            get(handlers::notification::list_notifications),
        )
        .route(
            "/notifications/stream",
            get(handlers::notification::stream_notifications),
        )
        .route(
            "/notifications/ack",
            post(handlers::notification::ack_notifications),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// GET /health - Simple health check endpoint (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
