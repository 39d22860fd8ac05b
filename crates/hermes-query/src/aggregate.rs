//! Distinct-value discovery for a single attribute.

use std::collections::HashSet;

use crate::backend::{Backend, Bucket};
use crate::classify::report;
use crate::error::StorageError;
use crate::filter::AttributeFilter;
use crate::plan::AggregationPlan;

/// Keeps the first `max_depth` `/`-separated segments of `key`.
///
/// A depth of 0, or a key without `/`, leaves the key unchanged.
pub fn truncate_key(key: &str, max_depth: usize) -> &str {
    if max_depth == 0 {
        return key;
    }
    match key.match_indices('/').nth(max_depth - 1) {
        Some((cut, _)) => &key[..cut],
        None => key,
    }
}

/// Truncates bucket keys and drops repeats, keeping first-seen order.
pub fn collapse_buckets<'a>(
    keys: impl IntoIterator<Item = &'a str>,
    max_depth: usize,
) -> Vec<String> {
    let mut seen = HashSet::new();
    keys.into_iter()
        .map(|key| truncate_key(key, max_depth))
        .filter(|key| seen.insert(*key))
        .map(str::to_string)
        .collect()
}

/// Runs a terms aggregation for `filter` and post-processes the buckets.
pub async fn aggregate(
    backend: &dyn Backend,
    filter: &AttributeFilter,
    scope: &str,
) -> Result<Vec<String>, StorageError> {
    let plan = AggregationPlan::for_attribute(scope, filter);
    tracing::debug!(field = %plan.field, size = plan.size, "running attribute aggregation");

    let buckets: Vec<Bucket> = backend.terms(&plan).await.map_err(report)?;
    Ok(collapse_buckets(
        buckets.iter().map(|b| b.key.as_str()),
        filter.max_depth,
    ))
}
