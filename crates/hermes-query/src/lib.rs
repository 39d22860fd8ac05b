//! Query engine for the Hermes audit event API.
//!
//! Turns caller-supplied filter parameters into backend queries and the
//! backend's answers into API responses. A request flows through:
//!
//! | Step | Module | Output |
//! |------|--------|--------|
//! | parse and validate | [`parse`] | [`Filter`] / [`AttributeFilter`] |
//! | translate | [`plan`] | [`QueryPlan`] / [`AggregationPlan`] |
//! | execute | [`backend`] | [`SearchHits`] / [`Bucket`]s |
//! | assemble | [`assemble`](mod@assemble), [`aggregate`](mod@aggregate) | [`hermes_types::EventList`] / values |
//!
//! Every executor failure goes through [`classify_error`] before it leaves the
//! crate, so callers only ever see a [`StorageError`] with a stable
//! [`ErrorCode`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use hermes_query::{list_events, LinkContext, Limits, MemoryBackend, QueryParams};
//!
//! let backend = MemoryBackend::new().with_events("p-1", events);
//! let params = QueryParams::parse("target_type=!compute/server&sort=time:asc");
//! let list = list_events(&backend, &params, "p-1", &link, &Limits::default()).await?;
//! ```

pub mod aggregate;
pub mod assemble;
pub mod backend;
pub mod classify;
mod engine;
mod error;
pub mod fields;
mod filter;
pub mod parse;
pub mod plan;

pub use assemble::LinkContext;
pub use backend::{Backend, Bucket, ElasticBackend, ElasticConfig, MemoryBackend, SearchHits};
pub use classify::{classify, classify_error};
pub use engine::{get_event, list_attributes, list_events, Limits};
pub use error::{BackendError, ErrorCode, FilterError, QueryError, StorageError};
pub use filter::{AttributeFilter, FieldOrder, Filter, QueryParams, SortOrder, TimeOp};
pub use plan::{is_valid_scope, AggregationPlan, Clause, QueryPlan, SortClause};
