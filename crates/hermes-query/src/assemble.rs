//! Turns backend hits into an [`EventList`] with pagination links.

use hermes_types::{Event, EventList, EventSummary};

use crate::filter::{Filter, QueryParams};

/// What the assembler needs to know about the incoming request to build
/// links back to it.
#[derive(Debug, Clone, Default)]
pub struct LinkContext {
    /// The request arrived over TLS.
    pub tls: bool,
    /// Value of `X-Forwarded-Proto`, if a proxy set one.
    pub forwarded_proto: Option<String>,
    /// Host (and port) the caller addressed.
    pub host: String,
    /// Request path without query string.
    pub path: String,
    /// The original query parameters.
    pub query: QueryParams,
}

impl LinkContext {
    pub fn scheme(&self) -> &'static str {
        let forwarded_https = self
            .forwarded_proto
            .as_deref()
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));
        if self.tls || forwarded_https {
            "https"
        } else {
            "http"
        }
    }

    /// The request URL with `offset` replaced and every other parameter
    /// kept in its original order.
    pub fn with_offset(&self, offset: usize) -> String {
        let mut encoder = url::form_urlencoded::Serializer::new(String::new());
        let mut replaced = false;
        for (key, value) in self.query.pairs() {
            if key == "offset" {
                if !replaced {
                    encoder.append_pair(key, &offset.to_string());
                    replaced = true;
                }
            } else {
                encoder.append_pair(key, value);
            }
        }
        if !replaced {
            encoder.append_pair("offset", &offset.to_string());
        }

        format!(
            "{}://{}{}?{}",
            self.scheme(),
            self.host,
            self.path,
            encoder.finish()
        )
    }
}

/// Builds the listing for one page of results.
pub fn assemble(documents: &[Event], total: u64, filter: &Filter, ctx: &LinkContext) -> EventList {
    let events = documents
        .iter()
        .map(|event| EventSummary::from_event(event, filter.details))
        .collect();

    let (offset, limit) = (filter.offset, filter.limit);
    let next = ((offset.saturating_add(limit) as u64) < total)
        .then(|| ctx.with_offset(offset + limit));
    let previous = (offset >= limit).then(|| ctx.with_offset(offset - limit));

    EventList {
        next,
        previous,
        events,
        total,
    }
}
