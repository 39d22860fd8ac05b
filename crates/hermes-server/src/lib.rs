//! Hermes server library logic.

pub mod api;
pub mod api_events;
pub mod config;
pub mod middleware;

use axum::{body::Body, http::Request, routing::get, Extension, Router};
use hermes_query::{Backend, Limits};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Executor for every event query.
    pub backend: Arc<dyn Backend>,
    /// Paging limits applied while parsing requests.
    pub limits: Limits,
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let scoped_routes = Router::new()
        .route("/v1/events", get(api_events::list_events_handler))
        .route("/v1/events/{event_id}", get(api_events::get_event_handler))
        .route(
            "/v1/attributes/{attribute_name}",
            get(api_events::list_attributes_handler),
        )
        .layer(axum::middleware::from_fn(middleware::scope_middleware));

    Router::new()
        .route("/", get(api::versions))
        .route("/health", get(api::health))
        .merge(scoped_routes)
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %uuid::Uuid::new_v4(),
                )
            }),
        )
        .layer(Extension(Arc::new(state)))
}
