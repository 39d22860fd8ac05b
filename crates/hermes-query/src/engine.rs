//! Request-level operations: the only entry points the HTTP layer calls.

use hermes_types::{Event, EventList};

use crate::aggregate::aggregate;
use crate::assemble::{assemble, LinkContext};
use crate::backend::Backend;
use crate::classify::report;
use crate::error::{QueryError, StorageError};
use crate::filter::QueryParams;
use crate::parse::{parse_attribute_filter, parse_filter};
use crate::plan::{translate, QueryPlan};

/// Paging and sizing limits applied while parsing requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest `offset + limit` the backend will serve.
    pub max_result_window: usize,
    /// Page size when the caller gives no `limit`.
    pub default_limit: usize,
    /// Bucket count when an attribute query gives no `limit`.
    pub attribute_default_limit: usize,
    /// Largest bucket count an attribute query may ask for.
    pub attribute_max_limit: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_result_window: 10_000,
            default_limit: 10,
            attribute_default_limit: 50,
            attribute_max_limit: 5_000,
        }
    }
}

/// Lists events matching the caller's filter parameters.
///
/// # Errors
///
/// `QueryError::InvalidFilter` for malformed parameters (the backend is not
/// contacted), `QueryError::Storage` for a classified backend failure.
pub async fn list_events(
    backend: &dyn Backend,
    params: &QueryParams,
    scope: &str,
    link: &LinkContext,
    limits: &Limits,
) -> Result<EventList, QueryError> {
    let filter = parse_filter(params, limits)?;
    let plan = translate(&filter, scope);
    tracing::debug!(
        scope,
        clauses = plan.clauses.len(),
        sorts = plan.sort.len(),
        from = plan.from,
        size = plan.size,
        "searching events"
    );

    let hits = backend.search(&plan).await.map_err(report)?;
    Ok(assemble(&hits.documents, hits.total, &filter, link))
}

/// Fetches a single event. `Ok(None)` means no event with that id exists in
/// the caller's scope.
///
/// # Errors
///
/// Returns the classified [`StorageError`] if the backend fails.
pub async fn get_event(
    backend: &dyn Backend,
    event_id: &str,
    scope: &str,
) -> Result<Option<Event>, StorageError> {
    let plan = QueryPlan::lookup(scope, event_id);
    let hits = backend.search(&plan).await.map_err(report)?;
    Ok(hits.documents.into_iter().next())
}

/// Lists the distinct values of one attribute.
///
/// # Errors
///
/// `QueryError::InvalidFilter` for a bad `max_depth` or `limit`,
/// `QueryError::Storage` for a classified backend failure.
pub async fn list_attributes(
    backend: &dyn Backend,
    attribute_name: &str,
    params: &QueryParams,
    scope: &str,
    limits: &Limits,
) -> Result<Vec<String>, QueryError> {
    let filter = parse_attribute_filter(attribute_name, params, limits)?;
    Ok(aggregate(backend, &filter, scope).await?)
}
