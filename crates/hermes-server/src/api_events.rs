//! Audit event query handlers.
//!
//! Provides:
//! - `GET /v1/events`: filtered, sorted and paginated event listing
//! - `GET /v1/events/{event_id}`: a single event
//! - `GET /v1/attributes/{attribute_name}`: distinct values of one attribute

use crate::middleware::TenantScope;
use crate::{api::ApiError, AppState};
use axum::{
    extract::{Extension, Path, RawQuery},
    http::{header, HeaderMap, Uri},
    Json,
};
use hermes_query::{LinkContext, QueryParams};
use hermes_types::{Event, EventList};
use std::sync::Arc;

fn link_context(uri: &Uri, headers: &HeaderMap, params: &QueryParams) -> LinkContext {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };

    LinkContext {
        tls: uri.scheme_str() == Some("https"),
        forwarded_proto: header_str(header::HeaderName::from_static("x-forwarded-proto")),
        host: header_str(header::HOST)
            .or_else(|| uri.authority().map(|a| a.to_string()))
            .unwrap_or_default(),
        path: uri.path().to_string(),
        query: params.clone(),
    }
}

/// Handler for `GET /v1/events`.
pub async fn list_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(TenantScope(scope)): Extension<TenantScope>,
    RawQuery(query): RawQuery,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<EventList>, ApiError> {
    let params = QueryParams::parse(query.as_deref().unwrap_or_default());
    let link = link_context(&uri, &headers, &params);

    let list = hermes_query::list_events(
        state.backend.as_ref(),
        &params,
        &scope,
        &link,
        &state.limits,
    )
    .await?;

    Ok(Json(list))
}

/// Handler for `GET /v1/events/{event_id}`.
pub async fn get_event_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(TenantScope(scope)): Extension<TenantScope>,
    Path(event_id): Path<String>,
) -> Result<Json<Event>, ApiError> {
    hermes_query::get_event(state.backend.as_ref(), &event_id, &scope)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("event not found".to_string()))
}

/// Handler for `GET /v1/attributes/{attribute_name}`.
pub async fn list_attributes_handler(
    Extension(state): Extension<Arc<AppState>>,
    Extension(TenantScope(scope)): Extension<TenantScope>,
    Path(attribute_name): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<Json<Vec<String>>, ApiError> {
    let params = QueryParams::parse(query.as_deref().unwrap_or_default());
    let values = hermes_query::list_attributes(
        state.backend.as_ref(),
        &attribute_name,
        &params,
        &scope,
        &state.limits,
    )
    .await?;

    Ok(Json(values))
}
