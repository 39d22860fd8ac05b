//! Elasticsearch executor.
//!
//! Renders plans as query DSL and posts them to `/<index>/_search`. Each
//! tenant's events live in indices named `audit-<scope>-*`.

use std::time::Duration;

use serde_json::{json, Map, Value};

use super::{Backend, Bucket, SearchHits};
use crate::error::BackendError;
use crate::plan::{is_valid_scope, AggregationPlan, Clause, QueryPlan};

/// Aggregation name used in terms requests.
const AGGREGATION: &str = "attribute";

/// Connection settings for [`ElasticBackend`].
#[derive(Debug, Clone)]
pub struct ElasticConfig {
    /// Base URL, e.g. `http://localhost:9200`.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout.
    pub timeout: Duration,
}

/// A [`Backend`] backed by an Elasticsearch cluster.
#[derive(Debug, Clone)]
pub struct ElasticBackend {
    client: reqwest::Client,
    config: ElasticConfig,
}

impl ElasticBackend {
    /// Builds the HTTP client. No connection is made until the first query.
    ///
    /// # Errors
    ///
    /// Returns the `reqwest` error if the TLS backend cannot be initialised.
    pub fn new(config: ElasticConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("hermes/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, config })
    }

    /// Index pattern holding a tenant's events.
    pub fn index_pattern(scope: &str) -> String {
        if scope.is_empty() {
            "audit-*".to_string()
        } else {
            format!("audit-{scope}-*")
        }
    }

    /// Renders the request body for a search plan.
    pub fn search_body(plan: &QueryPlan) -> Value {
        let mut filter = Vec::new();
        let mut must_not = Vec::new();
        let mut must = Vec::new();

        for clause in &plan.clauses {
            match clause {
                Clause::Term { field, value } => filter.push(json!({ "term": { *field: value } })),
                Clause::NotTerm { field, value } => {
                    must_not.push(json!({ "term": { *field: value } }))
                }
                Clause::Range { field, op, value } => {
                    filter.push(json!({ "range": { *field: { op.as_str(): value } } }))
                }
                Clause::FullText { query } => must.push(json!({
                    "query_string": { "query": query, "default_operator": "AND" }
                })),
            }
        }

        let sort: Vec<Value> = plan
            .sort
            .iter()
            .map(|s| json!({ s.field: { "order": s.order.as_str() } }))
            .collect();

        json!({
            "query": {
                "bool": {
                    "filter": filter,
                    "must_not": must_not,
                    "must": must,
                }
            },
            "sort": sort,
            "from": plan.from,
            "size": plan.size,
            "track_total_hits": true,
        })
    }

    /// Renders the request body for a terms aggregation.
    pub fn terms_body(plan: &AggregationPlan) -> Value {
        json!({
            "size": 0,
            "aggs": {
                AGGREGATION: {
                    "terms": { "field": plan.field, "size": plan.size }
                }
            }
        })
    }

    async fn post_search(&self, scope: &str, body: &Value) -> Result<Value, BackendError> {
        if !is_valid_scope(scope) {
            return Err(BackendError::typed(
                400,
                "invalid_index_name_exception",
                format!("scope {scope:?} is not a valid tenant id"),
            ));
        }
        let url = format!(
            "{}/{}/_search",
            self.config.url.trim_end_matches('/'),
            Self::index_pattern(scope)
        );

        let mut request = self.client.post(&url).json(body);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_deref());
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        let payload: Value = serde_json::from_str(&body).unwrap_or(Value::Null);

        if !status.is_success() {
            return Err(response_error(status.as_u16(), &payload));
        }
        if payload.is_null() {
            return Err(BackendError::untyped(format!(
                "response from {url} is not a JSON document"
            )));
        }
        if payload["timed_out"].as_bool() == Some(true) {
            return Err(BackendError::typed(
                504,
                "search_timeout",
                "search timed out before all shards answered",
            ));
        }
        Ok(payload)
    }
}

fn transport_error(err: reqwest::Error) -> BackendError {
    let message = err.to_string();
    let classified = if timed_out(&err) {
        BackendError::typed(504, "timeout_exception", format!("request timed out: {message}"))
    } else if err.is_connect() {
        BackendError {
            kind: Some("connect_exception".to_string()),
            ..BackendError::untyped(message)
        }
    } else {
        match err.status() {
            Some(status) => BackendError::typed(status.as_u16(), "http_error", message),
            None => BackendError::untyped(message),
        }
    };
    classified.with_source(err)
}

/// A client timeout hit while reading the body is reported as a decode
/// error; the timeout only shows up further down the source chain.
fn timed_out(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if cause.to_string().to_ascii_lowercase().contains("timed out") {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Decodes an Elasticsearch error body:
/// `{"error": {"type": ..., "reason": ..., "root_cause": [...]}, "status": ...}`.
fn response_error(status: u16, payload: &Value) -> BackendError {
    let error = &payload["error"];
    let kind = error["type"].as_str().unwrap_or("unknown");
    let mut reason = error["reason"]
        .as_str()
        .or_else(|| error.as_str())
        .unwrap_or("unknown error")
        .to_string();

    let root_causes: Vec<&Map<String, Value>> = error["root_cause"]
        .as_array()
        .map(|causes| causes.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();

    // The outer reason of a search_phase_execution_exception is generic;
    // the first root cause says what actually went wrong.
    if let Some(first) = root_causes
        .first()
        .and_then(|c| c.get("reason"))
        .and_then(Value::as_str)
    {
        reason = format!("{reason}: {first}");
    }

    let cause_types: Vec<Value> = root_causes
        .iter()
        .filter_map(|c| c.get("type").cloned())
        .collect();

    let mut err = BackendError::typed(status, kind, reason);
    if !cause_types.is_empty() {
        err = err.with_detail("root_cause", cause_types);
    }
    err
}

fn parse_hits(payload: &Value) -> Result<SearchHits, BackendError> {
    let hits = &payload["hits"];
    // 7.x reports {"value": n, "relation": ...}; older clusters a bare number.
    let total = hits["total"]["value"]
        .as_u64()
        .or_else(|| hits["total"].as_u64())
        .unwrap_or(0);

    let documents = hits["hits"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|hit| serde_json::from_value(hit["_source"].clone()))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            BackendError::untyped(format!("malformed event document: {e}")).with_source(e)
        })?;

    Ok(SearchHits { documents, total })
}

fn parse_buckets(payload: &Value) -> Vec<Bucket> {
    payload["aggregations"][AGGREGATION]["buckets"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|bucket| {
            let key = match &bucket["key"] {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            Some(Bucket {
                key,
                doc_count: bucket["doc_count"].as_u64().unwrap_or(0),
            })
        })
        .collect()
}

#[async_trait::async_trait]
impl Backend for ElasticBackend {
    async fn search(&self, plan: &QueryPlan) -> Result<SearchHits, BackendError> {
        let payload = self.post_search(&plan.scope, &Self::search_body(plan)).await?;
        parse_hits(&payload)
    }

    async fn terms(&self, plan: &AggregationPlan) -> Result<Vec<Bucket>, BackendError> {
        let payload = self.post_search(&plan.scope, &Self::terms_body(plan)).await?;
        Ok(parse_buckets(&payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{SortOrder, TimeOp};

    #[test]
    fn index_pattern_is_tenant_scoped() {
        assert_eq!(ElasticBackend::index_pattern("p-1"), "audit-p-1-*");
        assert_eq!(ElasticBackend::index_pattern(""), "audit-*");
    }

    #[test]
    fn search_body_places_clauses_by_kind() {
        let plan = QueryPlan::new("p-1")
            .with_clause(Clause::Term { field: "outcome", value: "success".into() })
            .with_clause(Clause::NotTerm { field: "target.typeURI", value: "compute/server".into() })
            .with_clause(Clause::Range {
                field: "eventTime",
                op: TimeOp::Gte,
                value: "2024-01-01T00:00:00Z".into(),
            })
            .with_clause(Clause::FullText { query: "volume".into() })
            .with_sort("eventTime", SortOrder::Desc)
            .with_window(20, 10);

        let body = ElasticBackend::search_body(&plan);
        let bool_query = &body["query"]["bool"];
        assert_eq!(bool_query["filter"][0]["term"]["outcome"], "success");
        assert_eq!(
            bool_query["filter"][1]["range"]["eventTime"]["gte"],
            "2024-01-01T00:00:00Z"
        );
        assert_eq!(bool_query["must_not"][0]["term"]["target.typeURI"], "compute/server");
        assert_eq!(bool_query["must"][0]["query_string"]["query"], "volume");
        assert_eq!(body["sort"][0]["eventTime"]["order"], "desc");
        assert_eq!(body["from"], 20);
        assert_eq!(body["size"], 10);
    }

    #[test]
    fn terms_body_requests_no_documents() {
        let plan = AggregationPlan {
            scope: "p-1".into(),
            field: "target.typeURI".into(),
            size: 25,
        };
        let body = ElasticBackend::terms_body(&plan);
        assert_eq!(body["size"], 0);
        assert_eq!(body["aggs"]["attribute"]["terms"]["field"], "target.typeURI");
        assert_eq!(body["aggs"]["attribute"]["terms"]["size"], 25);
    }

    #[test]
    fn hits_are_decoded_for_both_total_shapes() {
        let payload = json!({
            "hits": {
                "total": { "value": 42, "relation": "eq" },
                "hits": [ { "_source": { "id": "e-1", "action": "create" } } ]
            }
        });
        let hits = parse_hits(&payload).unwrap();
        assert_eq!(hits.total, 42);
        assert_eq!(hits.documents[0].id, "e-1");

        let payload = json!({ "hits": { "total": 3, "hits": [] } });
        assert_eq!(parse_hits(&payload).unwrap().total, 3);
    }

    #[test]
    fn missing_aggregation_yields_no_buckets() {
        assert!(parse_buckets(&json!({ "hits": {} })).is_empty());

        let payload = json!({
            "aggregations": { "attribute": { "buckets": [
                { "key": "compute/server", "doc_count": 7 },
                { "key": 200, "doc_count": 1 }
            ] } }
        });
        let buckets = parse_buckets(&payload);
        assert_eq!(buckets[0], Bucket { key: "compute/server".into(), doc_count: 7 });
        assert_eq!(buckets[1].key, "200");
    }

    #[test]
    fn error_bodies_keep_type_and_root_cause() {
        let payload = json!({
            "error": {
                "type": "search_phase_execution_exception",
                "reason": "all shards failed",
                "root_cause": [
                    { "type": "query_shard_exception", "reason": "Failed to parse query [foo:(]" }
                ]
            },
            "status": 400
        });
        let err = response_error(400, &payload);
        assert_eq!(err.status, Some(400));
        assert_eq!(err.kind.as_deref(), Some("search_phase_execution_exception"));
        assert_eq!(err.message, "all shards failed: Failed to parse query [foo:(]");
        assert_eq!(err.details["root_cause"], json!(["query_shard_exception"]));
    }

    fn backend_at(url: String) -> ElasticBackend {
        ElasticBackend::new(ElasticConfig {
            url,
            username: None,
            password: None,
            timeout: Duration::from_millis(300),
        })
        .unwrap()
    }

    /// Answers every request with headers and a truncated body, then hangs.
    async fn stalling_server() -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    let _ = socket.read(&mut buf).await;
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: 100\r\n\r\n{\"hits\":",
                        )
                        .await;
                    tokio::time::sleep(Duration::from_secs(30)).await;
                });
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn body_read_timeout_is_a_retryable_query_timeout() {
        let backend = backend_at(stalling_server().await);
        let err = backend
            .search(&QueryPlan::new("p-1").with_window(0, 10))
            .await
            .unwrap_err();

        assert_eq!(err.status, Some(504));
        let code = crate::classify::error_code(&err);
        assert_eq!(code, crate::error::ErrorCode::QueryTimeout);
        assert!(code.is_retryable());
    }

    #[tokio::test]
    async fn unsafe_scope_never_reaches_the_cluster() {
        let backend = backend_at("http://127.0.0.1:9".to_string());
        let err = backend
            .search(&QueryPlan::new("p-1,audit-other"))
            .await
            .unwrap_err();
        assert_eq!(err.status, Some(400));
        assert_eq!(err.kind.as_deref(), Some("invalid_index_name_exception"));
    }

    #[tokio::test]
    async fn refused_connection_is_a_connection_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = backend_at(format!("http://{addr}"))
            .search(&QueryPlan::new("p-1"))
            .await
            .unwrap_err();

        assert_eq!(err.kind.as_deref(), Some("connect_exception"));
        assert_eq!(
            crate::classify::error_code(&err),
            crate::error::ErrorCode::ConnectionFailure
        );
    }
}
