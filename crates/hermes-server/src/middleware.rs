use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use hermes_query::{is_valid_scope, QueryParams};

/// Role allowed to query a tenant other than its own.
pub const AUDIT_VIEWER_ROLE: &str = "cloud_audit_viewer";

/// Tenant whose events a request may see, stored in request extensions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TenantScope(pub String);

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn has_role(headers: &HeaderMap, role: &str) -> bool {
    header(headers, "X-Roles")
        .is_some_and(|roles| roles.split(',').any(|r| r.trim() == role))
}

/// Resolves the tenant scope from identity headers and, for audit viewers,
/// an explicit `project_id` or `domain_id` query parameter.
pub fn resolve_scope(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    if has_role(headers, AUDIT_VIEWER_ROLE) {
        let params = QueryParams::parse(query.unwrap_or_default());
        let requested = ["project_id", "domain_id"]
            .into_iter()
            .find_map(|key| params.get(key).filter(|value| !value.is_empty()));
        if let Some(scope) = requested {
            return Some(scope.to_string());
        }
    }

    header(headers, "X-Project-Id")
        .or_else(|| header(headers, "X-Domain-Id"))
        .map(str::to_string)
}

/// Middleware that rejects requests without a usable tenant scope and
/// records the scope for handlers.
///
/// The identity headers are set by the authenticating proxy in front of the
/// service; they are trusted as-is. A scope outside `[A-Za-z0-9_-]` is a bad
/// request.
pub async fn scope_middleware(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let Some(scope) = resolve_scope(req.headers(), req.uri().query()) else {
        tracing::debug!(path = %req.uri().path(), "request without tenant scope rejected");
        return Err(StatusCode::UNAUTHORIZED);
    };
    if !is_valid_scope(&scope) {
        tracing::debug!(scope = %scope, "request with malformed tenant scope rejected");
        return Err(StatusCode::BAD_REQUEST);
    }

    req.extensions_mut().insert(TenantScope(scope));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn project_header_wins_over_domain() {
        let h = headers(&[("x-project-id", "p-1"), ("x-domain-id", "d-1")]);
        assert_eq!(resolve_scope(&h, None).as_deref(), Some("p-1"));

        let h = headers(&[("x-domain-id", "d-1")]);
        assert_eq!(resolve_scope(&h, None).as_deref(), Some("d-1"));
    }

    #[test]
    fn blank_headers_are_no_scope() {
        let h = headers(&[("x-project-id", "  ")]);
        assert_eq!(resolve_scope(&h, None), None);
        assert_eq!(resolve_scope(&HeaderMap::new(), None), None);
    }

    #[test]
    fn query_override_requires_viewer_role() {
        let h = headers(&[("x-project-id", "p-1")]);
        assert_eq!(
            resolve_scope(&h, Some("project_id=p-9")).as_deref(),
            Some("p-1")
        );

        let h = headers(&[("x-project-id", "p-1"), ("x-roles", "member, cloud_audit_viewer")]);
        assert_eq!(
            resolve_scope(&h, Some("project_id=p-9")).as_deref(),
            Some("p-9")
        );
        assert_eq!(
            resolve_scope(&h, Some("domain_id=d-2")).as_deref(),
            Some("d-2")
        );
        assert_eq!(resolve_scope(&h, Some("limit=5")).as_deref(), Some("p-1"));
    }
}
