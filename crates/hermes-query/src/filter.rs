//! Request-scoped filter values.
//!
//! A [`Filter`] is what a caller asked for after validation. It carries no
//! behavior; [`crate::parse`] builds it and [`crate::plan`] reads it.

use std::collections::BTreeMap;
use std::fmt;

/// Comparison operator of a time bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimeOp {
    Lt,
    Lte,
    Gt,
    Gte,
}

impl TimeOp {
    /// Parses an operator token as written in the `time` parameter.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
        }
    }
}

impl fmt::Display for TimeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

/// One caller-requested sort key.
///
/// `field` is always an entry of [`crate::fields::SORTABLE_FIELDS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldOrder {
    pub field: &'static str,
    pub order: SortOrder,
}

/// A validated event-list query.
///
/// Scalar fields use `""` for "not set". A scalar starting with `!` asks
/// for events whose field differs from the rest of the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub observer_type: String,
    pub target_type: String,
    pub target_id: String,
    pub initiator_id: String,
    pub initiator_type: String,
    pub initiator_name: String,
    pub action: String,
    pub outcome: String,
    pub search: String,
    pub request_path: String,
    /// Time bounds keyed by operator, values normalized to RFC 3339.
    pub time: BTreeMap<TimeOp, String>,
    pub offset: usize,
    pub limit: usize,
    pub sort: Vec<FieldOrder>,
    /// Include attachments in the listing.
    pub details: bool,
}

/// A validated attribute-discovery query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    /// API field name, or a raw document path when it has no alias.
    pub query_name: String,
    /// Number of `/`-separated segments to keep; 0 keeps the whole value.
    pub max_depth: usize,
    /// Maximum number of buckets requested from the backend.
    pub limit: usize,
}

/// Decoded query-string pairs in request order.
///
/// Repeated keys are kept; lookups return the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Decodes a raw `application/x-www-form-urlencoded` query string.
    pub fn parse(raw: &str) -> Self {
        url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    /// Concatenates the values of a current and a deprecated parameter name.
    ///
    /// Older clients send the deprecated name; sending both yields the two
    /// values glued together, which then matches nothing. Kept as-is for
    /// compatibility.
    pub fn combined(&self, current: &str, legacy: &str) -> String {
        let mut value = self.get(current).unwrap_or_default().to_string();
        value.push_str(self.get(legacy).unwrap_or_default());
        value
    }
}

impl<K, V> FromIterator<(K, V)> for QueryParams
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
