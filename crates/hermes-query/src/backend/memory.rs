//! In-process executor over a fixed set of events.
//!
//! Mirrors the observable behavior of the Elasticsearch executor closely
//! enough for local development and tests: per-tenant storage, the result
//! window limit, `_count`-ordered buckets, and missing sort values last.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use hermes_types::Event;
use serde_json::Value;

use super::{Backend, Bucket, SearchHits};
use crate::error::BackendError;
use crate::fields::TIME_FIELD;
use crate::filter::{SortOrder, TimeOp};
use crate::parse::parse_timestamp;
use crate::plan::{AggregationPlan, Clause, QueryPlan, SortClause};

type FailureFn = dyn Fn() -> BackendError + Send + Sync;

/// A [`Backend`] holding events in memory, keyed by tenant scope.
#[derive(Clone)]
pub struct MemoryBackend {
    tenants: HashMap<String, Vec<(Event, Value)>>,
    max_result_window: usize,
    failure: Option<Arc<FailureFn>>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            tenants: HashMap::new(),
            max_result_window: 10_000,
            failure: None,
        }
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores events under a tenant scope.
    pub fn with_events(mut self, scope: &str, events: impl IntoIterator<Item = Event>) -> Self {
        let stored = self.tenants.entry(scope.to_string()).or_default();
        for event in events {
            // Event only holds strings and JSON values, so this cannot fail.
            let doc = serde_json::to_value(&event).unwrap_or(Value::Null);
            stored.push((event, doc));
        }
        self
    }

    pub fn with_max_result_window(mut self, max: usize) -> Self {
        self.max_result_window = max;
        self
    }

    /// Makes every request fail with the error built by `failure`.
    pub fn failing_with(
        mut self,
        failure: impl Fn() -> BackendError + Send + Sync + 'static,
    ) -> Self {
        self.failure = Some(Arc::new(failure));
        self
    }

    fn check_failure(&self) -> Result<(), BackendError> {
        match &self.failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    /// Events visible under `scope`; the empty scope sees every tenant.
    fn scoped<'a>(&'a self, scope: &'a str) -> impl Iterator<Item = &'a (Event, Value)> + 'a {
        self.tenants
            .iter()
            .filter(move |(tenant, _)| scope.is_empty() || tenant.as_str() == scope)
            .flat_map(|(_, events)| events.iter())
    }
}

fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |value, segment| value.get(segment))
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
        other => Some(other.to_string()),
    }
}

fn string_leaves<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| string_leaves(item, out)),
        Value::Object(map) => map.values().for_each(|item| string_leaves(item, out)),
        _ => {}
    }
}

fn term_matches(doc: &Value, field: &str, expected: &str) -> bool {
    lookup(doc, field)
        .and_then(as_text)
        .is_some_and(|actual| actual == expected)
}

fn clause_matches(doc: &Value, clause: &Clause) -> bool {
    match clause {
        Clause::Term { field, value } => term_matches(doc, field, value),
        Clause::NotTerm { field, value } => !term_matches(doc, field, value),
        Clause::Range { field, op, value } => {
            let actual = lookup(doc, field)
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            match (actual, parse_timestamp(value)) {
                (Some(actual), Some(bound)) => match op {
                    TimeOp::Lt => actual < bound,
                    TimeOp::Lte => actual <= bound,
                    TimeOp::Gt => actual > bound,
                    TimeOp::Gte => actual >= bound,
                },
                _ => false,
            }
        }
        Clause::FullText { query } => {
            let mut leaves = Vec::new();
            string_leaves(doc, &mut leaves);
            let leaves: Vec<String> = leaves.iter().map(|s| s.to_lowercase()).collect();
            query
                .split_whitespace()
                .map(str::to_lowercase)
                .all(|term| leaves.iter().any(|leaf| leaf.contains(&term)))
        }
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
enum SortKey {
    Time(DateTime<FixedOffset>),
    Text(String),
}

fn sort_key(doc: &Value, field: &str) -> Option<SortKey> {
    let value = lookup(doc, field)?;
    if field == TIME_FIELD {
        if let Some(ts) = value.as_str().and_then(parse_timestamp) {
            return Some(SortKey::Time(ts));
        }
    }
    as_text(value).map(SortKey::Text)
}

fn compare(a: &Value, b: &Value, sort: &[SortClause]) -> Ordering {
    for clause in sort {
        let ordering = match (sort_key(a, clause.field), sort_key(b, clause.field)) {
            (Some(x), Some(y)) => match clause.order {
                SortOrder::Asc => x.cmp(&y),
                SortOrder::Desc => y.cmp(&x),
            },
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[async_trait::async_trait]
impl Backend for MemoryBackend {
    async fn search(&self, plan: &QueryPlan) -> Result<SearchHits, BackendError> {
        self.check_failure()?;

        let requested = plan.from.saturating_add(plan.size);
        if requested > self.max_result_window {
            return Err(BackendError::typed(
                400,
                "illegal_argument_exception",
                format!(
                    "Result window is too large, from + size must be less than or equal to: [{}] but was [{}].",
                    self.max_result_window, requested
                ),
            ));
        }

        let mut matching: Vec<&(Event, Value)> = self
            .scoped(&plan.scope)
            .filter(|(_, doc)| plan.clauses.iter().all(|c| clause_matches(doc, c)))
            .collect();
        matching.sort_by(|(_, a), (_, b)| compare(a, b, &plan.sort));

        let total = matching.len() as u64;
        let documents = matching
            .into_iter()
            .skip(plan.from)
            .take(plan.size)
            .map(|(event, _)| event.clone())
            .collect();

        Ok(SearchHits { documents, total })
    }

    async fn terms(&self, plan: &AggregationPlan) -> Result<Vec<Bucket>, BackendError> {
        self.check_failure()?;

        let mut counts: HashMap<String, u64> = HashMap::new();
        for (_, doc) in self.scoped(&plan.scope) {
            if let Some(key) = lookup(doc, &plan.field).and_then(as_text) {
                *counts.entry(key).or_default() += 1;
            }
        }

        let mut buckets: Vec<Bucket> = counts
            .into_iter()
            .map(|(key, doc_count)| Bucket { key, doc_count })
            .collect();
        buckets.sort_by(|a, b| b.doc_count.cmp(&a.doc_count).then_with(|| a.key.cmp(&b.key)));
        buckets.truncate(plan.size);
        Ok(buckets)
    }
}
