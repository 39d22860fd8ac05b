//! Normalizes backend failures into [`StorageError`]s.
//!
//! Classification walks an ordered rule table and stops at the first match.
//! Rules look at the status code and backend error type first; the
//! substring rules only fire for errors that carry no such structure.

use crate::error::{BackendError, ErrorCode, StorageError};

struct Rule {
    code: ErrorCode,
    matches: fn(&BackendError) -> bool,
}

const RULES: &[Rule] = &[
    Rule {
        code: ErrorCode::IndexNotFound,
        matches: |e| e.status == Some(404) || kind_is(e, &["index_not_found_exception"]),
    },
    Rule {
        code: ErrorCode::ResourceExhausted,
        matches: |e| {
            kind_is(
                e,
                &[
                    "circuit_breaking_exception",
                    "too_many_buckets_exception",
                    "too_many_clauses",
                ],
            ) || message_has(
                e,
                &["result window is too large", "data too large", "too many buckets"],
            )
        },
    },
    Rule {
        code: ErrorCode::TooManyRequests,
        matches: |e| e.status == Some(429) || kind_is(e, &["es_rejected_execution_exception"]),
    },
    Rule {
        code: ErrorCode::QueryTimeout,
        matches: |e| {
            matches!(e.status, Some(408) | Some(504))
                || kind_is(e, &["timeout_exception", "search_timeout", "receive_timeout_transport_exception"])
        },
    },
    Rule {
        code: ErrorCode::QuerySyntaxError,
        matches: |e| {
            e.status == Some(400)
                || kind_is(
                    e,
                    &[
                        "parsing_exception",
                        "query_shard_exception",
                        "search_phase_execution_exception",
                        "x_content_parse_exception",
                        "illegal_argument_exception",
                    ],
                )
        },
    },
    Rule {
        code: ErrorCode::ConnectionFailure,
        matches: |e| {
            matches!(e.status, Some(502) | Some(503))
                || kind_is(e, &["connect_exception"])
                || (e.status.is_none()
                    && e.kind.is_none()
                    && message_has(
                        e,
                        &[
                            "connection refused",
                            "connection reset",
                            "no available connection",
                            "unreachable",
                            "dns error",
                            "error sending request",
                            "timeout",
                            "timed out",
                        ],
                    ))
        },
    },
];

fn kind_is(err: &BackendError, kinds: &[&str]) -> bool {
    err.kind
        .as_deref()
        .is_some_and(|kind| kinds.iter().any(|k| kind.eq_ignore_ascii_case(k)))
}

fn message_has(err: &BackendError, needles: &[&str]) -> bool {
    let message = err.message.to_ascii_lowercase();
    needles.iter().any(|needle| message.contains(needle))
}

fn user_message(code: ErrorCode) -> (&'static str, Option<&'static str>) {
    match code {
        ErrorCode::QuerySyntaxError => (
            "the search query could not be parsed",
            Some("check the search and filter parameters for unsupported syntax"),
        ),
        ErrorCode::IndexNotFound => ("no audit events are stored for this scope", None),
        ErrorCode::QueryTimeout => (
            "the query took too long to complete",
            Some("narrow your time range or add more filters"),
        ),
        ErrorCode::TooManyRequests => (
            "the storage backend is rejecting requests due to load",
            Some("retry after a short delay"),
        ),
        ErrorCode::ConnectionFailure => (
            "the storage backend is unreachable",
            Some("retry later"),
        ),
        ErrorCode::ResourceExhausted => (
            "the query exceeds the storage backend's resource limits",
            Some("narrow your time range or reduce offset and limit"),
        ),
        ErrorCode::InternalError => ("an internal storage error occurred", None),
    }
}

/// Returns the code the first matching rule assigns to `err`.
pub fn error_code(err: &BackendError) -> ErrorCode {
    RULES
        .iter()
        .find(|rule| (rule.matches)(err))
        .map_or(ErrorCode::InternalError, |rule| rule.code)
}

/// Classifies a backend error. Absent errors pass through as `None`.
pub fn classify(err: Option<BackendError>) -> Option<StorageError> {
    err.map(classify_error)
}

/// Classifies a backend error that is known to be present.
pub fn classify_error(err: BackendError) -> StorageError {
    let code = error_code(&err);
    let (message, hint) = user_message(code);
    let mut details = err.details.clone();
    details.insert("retryable".to_string(), code.is_retryable().into());

    StorageError {
        code,
        message: message.to_string(),
        http_status: code.http_status(),
        hint: hint.map(str::to_string),
        retryable: code.is_retryable(),
        details,
        cause: Some(err),
    }
}

/// Classifies a failure from an executor call and logs it with its cause.
pub(crate) fn report(err: BackendError) -> StorageError {
    let classified = classify_error(err);
    if let Some(cause) = classified.cause() {
        tracing::warn!(
            code = ?classified.code(),
            status = ?cause.status,
            kind = cause.kind.as_deref().unwrap_or("-"),
            details = %serde_json::Value::Object(cause.details.clone()),
            "storage backend request failed: {}",
            cause
        );
    }
    classified
}
