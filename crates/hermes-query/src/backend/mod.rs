//! Execution boundary to the search backend.
//!
//! The engine only ever talks to a [`Backend`]. Connection handling,
//! retries and cancellation belong to the implementation.

mod elastic;
mod memory;

pub use elastic::{ElasticBackend, ElasticConfig};
pub use memory::MemoryBackend;

use hermes_types::Event;

use crate::error::BackendError;
use crate::plan::{AggregationPlan, QueryPlan};

/// One page of matching documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchHits {
    pub documents: Vec<Event>,
    /// Number of matches across all pages.
    pub total: u64,
}

/// One distinct value of an aggregated field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub key: String,
    pub doc_count: u64,
}

/// A document store holding audit events.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    /// Runs a search and returns the requested window of documents.
    async fn search(&self, plan: &QueryPlan) -> Result<SearchHits, BackendError>;

    /// Runs a terms aggregation. Buckets come back in backend order.
    async fn terms(&self, plan: &AggregationPlan) -> Result<Vec<Bucket>, BackendError>;
}
