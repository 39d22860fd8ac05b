//! Error types for the query engine.
//!
//! Two failure domains never mix: [`FilterError`] is raised while reading
//! caller input and never reaches the backend, and [`StorageError`] is the
//! classified form of a [`BackendError`] reported by an executor.

use serde::Serialize;
use serde_json::{Map, Value};

/// Malformed caller input. The message is shown to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("sort parameter contains an empty element")]
    EmptySortElement,

    #[error("sort element '{0}' has an empty field name")]
    EmptySortField(String),

    #[error("not a valid sort field: {0}")]
    UnknownSortField(String),

    #[error("sort element '{0}' has an empty direction")]
    EmptySortDirection(String),

    #[error("not a valid sort direction: {0} (expected asc or desc)")]
    InvalidSortDirection(String),

    #[error("time bound '{0}' must have the form <operator>:<timestamp>")]
    MalformedTimeBound(String),

    #[error("time bound '{0}' has an empty operator")]
    EmptyTimeOperator(String),

    #[error("not a valid time operator: {0} (expected lt, lte, gt or gte)")]
    UnknownTimeOperator(String),

    #[error("time operator '{0}' has an empty timestamp")]
    EmptyTimestamp(String),

    #[error("not a valid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("time operator '{0}' given more than once")]
    DuplicateTimeOperator(String),

    #[error("parameter {param} must be a non-negative integer, got '{value}'")]
    InvalidInteger { param: &'static str, value: String },

    #[error("offset + limit must not exceed {max}")]
    WindowExceeded { max: usize },

    #[error("limit must be between 1 and {max}")]
    LimitOutOfRange { max: usize },
}

/// A failure reported by a backend executor, before classification.
///
/// Executors fill in whatever they know: typed errors carry an HTTP-like
/// status and a backend error type, transport failures only a message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct BackendError {
    pub status: Option<u16>,
    /// Backend-specific error type, e.g. `index_not_found_exception`.
    pub kind: Option<String>,
    pub message: String,
    pub details: Map<String, Value>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl BackendError {
    /// An error the backend answered with.
    pub fn typed(status: u16, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            kind: Some(kind.into()),
            message: message.into(),
            details: Map::new(),
            source: None,
        }
    }

    /// An error without status or type, e.g. a dropped connection.
    pub fn untyped(message: impl Into<String>) -> Self {
        Self {
            status: None,
            kind: None,
            message: message.into(),
            details: Map::new(),
            source: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

/// Stable, machine-readable classification of a storage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    QuerySyntaxError,
    IndexNotFound,
    QueryTimeout,
    TooManyRequests,
    ConnectionFailure,
    ResourceExhausted,
    InternalError,
}

impl ErrorCode {
    pub fn http_status(self) -> u16 {
        match self {
            Self::QuerySyntaxError | Self::ResourceExhausted => 400,
            Self::IndexNotFound => 404,
            Self::TooManyRequests => 429,
            Self::InternalError => 500,
            Self::ConnectionFailure => 503,
            Self::QueryTimeout => 504,
        }
    }

    /// Whether repeating the same request later may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::QueryTimeout | Self::TooManyRequests | Self::ConnectionFailure
        )
    }
}

/// A classified storage failure.
///
/// Only [`crate::classify`] builds these. Serializing one yields the body
/// returned to callers: `error`, `code`, `hint` and `retryable`. The details
/// and the underlying [`BackendError`] are kept for logging and never
/// serialized.
#[derive(Debug, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct StorageError {
    pub(crate) code: ErrorCode,
    #[serde(rename = "error")]
    pub(crate) message: String,
    #[serde(skip)]
    pub(crate) http_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) hint: Option<String>,
    pub(crate) retryable: bool,
    #[serde(skip)]
    pub(crate) details: Map<String, Value>,
    #[serde(skip)]
    #[source]
    pub(crate) cause: Option<BackendError>,
}

impl StorageError {
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    pub fn details(&self) -> &Map<String, Value> {
        &self.details
    }

    pub fn cause(&self) -> Option<&BackendError> {
        self.cause.as_ref()
    }
}

/// Any failure of a request-level engine operation.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
