//! Builds [`Filter`]s and [`AttributeFilter`]s from query-string input.
//!
//! Parsing is fail-fast: the first invalid parameter aborts with a
//! [`FilterError`] and no partial filter is returned.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};

use crate::engine::Limits;
use crate::error::FilterError;
use crate::fields;
use crate::filter::{AttributeFilter, FieldOrder, Filter, QueryParams, SortOrder, TimeOp};

/// Offset-carrying formats accepted in addition to RFC 3339.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z"];

/// Offset-less format, read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses a timestamp in any accepted format.
pub fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts);
    }
    for format in OFFSET_FORMATS {
        if let Ok(ts) = DateTime::parse_from_str(value, format) {
            return Some(ts);
        }
    }
    NAIVE_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive).fixed_offset())
    })
}

/// Parses the `sort` parameter, e.g. `time:desc,action`.
pub fn parse_sort(raw: &str) -> Result<Vec<FieldOrder>, FilterError> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }

    raw.split(',')
        .map(|element| {
            if element.is_empty() {
                return Err(FilterError::EmptySortElement);
            }
            let (name, direction) = match element.split_once(':') {
                Some((name, direction)) => (name, Some(direction)),
                None => (element, None),
            };
            if name.is_empty() {
                return Err(FilterError::EmptySortField(element.to_string()));
            }
            let field = fields::sortable(name)
                .ok_or_else(|| FilterError::UnknownSortField(name.to_string()))?;
            let order = match direction {
                None => SortOrder::Asc,
                Some("") => return Err(FilterError::EmptySortDirection(element.to_string())),
                Some(token) => SortOrder::from_token(token)
                    .ok_or_else(|| FilterError::InvalidSortDirection(token.to_string()))?,
            };
            Ok(FieldOrder { field, order })
        })
        .collect()
}

/// Parses the `time` parameter, e.g. `gte:2024-01-01T00:00:00Z,lt:2024-02-01T00:00:00Z`.
///
/// Values are normalized to RFC 3339 so every backend compares the same
/// instant regardless of the input format.
pub fn parse_time(raw: &str) -> Result<BTreeMap<TimeOp, String>, FilterError> {
    let mut bounds = BTreeMap::new();
    if raw.is_empty() {
        return Ok(bounds);
    }

    for element in raw.split(',') {
        let (token, value) = element
            .split_once(':')
            .ok_or_else(|| FilterError::MalformedTimeBound(element.to_string()))?;
        if token.is_empty() {
            return Err(FilterError::EmptyTimeOperator(element.to_string()));
        }
        let op = TimeOp::from_token(token)
            .ok_or_else(|| FilterError::UnknownTimeOperator(token.to_string()))?;
        if value.is_empty() {
            return Err(FilterError::EmptyTimestamp(token.to_string()));
        }
        let ts = parse_timestamp(value)
            .ok_or_else(|| FilterError::InvalidTimestamp(value.to_string()))?;
        if bounds.contains_key(&op) {
            return Err(FilterError::DuplicateTimeOperator(token.to_string()));
        }
        bounds.insert(
            op,
            ts.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        );
    }

    Ok(bounds)
}

fn parse_count(params: &QueryParams, param: &'static str, default: usize) -> Result<usize, FilterError> {
    match params.get(param) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| FilterError::InvalidInteger {
            param,
            value: value.to_string(),
        }),
    }
}

/// Builds a validated [`Filter`] from event-list query parameters.
pub fn parse_filter(params: &QueryParams, limits: &Limits) -> Result<Filter, FilterError> {
    let sort = parse_sort(params.get("sort").unwrap_or_default())?;
    let time = parse_time(params.get("time").unwrap_or_default())?;
    let offset = parse_count(params, "offset", 0)?;
    let limit = parse_count(params, "limit", limits.default_limit)?;

    if offset.saturating_add(limit) > limits.max_result_window {
        return Err(FilterError::WindowExceeded {
            max: limits.max_result_window,
        });
    }

    let single = |name: &str| params.get(name).unwrap_or_default().to_string();

    Ok(Filter {
        observer_type: params.combined("observer_type", "source"),
        target_type: params.combined("target_type", "resource_type"),
        target_id: single("target_id"),
        initiator_id: params.combined("initiator_id", "user_name"),
        initiator_type: single("initiator_type"),
        initiator_name: single("initiator_name"),
        action: params.combined("action", "event_type"),
        outcome: single("outcome"),
        search: single("search"),
        request_path: single("request_path"),
        time,
        offset,
        limit,
        sort,
        details: params.contains("details"),
    })
}

/// Builds a validated [`AttributeFilter`] for `GET /v1/attributes/{name}`.
pub fn parse_attribute_filter(
    name: &str,
    params: &QueryParams,
    limits: &Limits,
) -> Result<AttributeFilter, FilterError> {
    let max_depth = parse_count(params, "max_depth", 0)?;
    let limit = parse_count(params, "limit", limits.attribute_default_limit)?;
    if limit == 0 || limit > limits.attribute_max_limit {
        return Err(FilterError::LimitOutOfRange {
            max: limits.attribute_max_limit,
        });
    }

    Ok(AttributeFilter {
        query_name: name.to_string(),
        max_depth,
        limit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(raw: &str) -> QueryParams {
        QueryParams::parse(raw)
    }

    #[test]
    fn empty_sort_is_no_sort() {
        assert_eq!(parse_sort(""), Ok(Vec::new()));
    }

    #[test]
    fn comma_only_sort_is_rejected() {
        for raw in [",", ",,", ",,,"] {
            assert_eq!(parse_sort(raw), Err(FilterError::EmptySortElement), "for {raw:?}");
        }
        assert_eq!(parse_sort("time,"), Err(FilterError::EmptySortElement));
    }

    #[test]
    fn sort_direction_defaults_to_asc() {
        let sort = parse_sort("time:desc,action").unwrap();
        assert_eq!(
            sort,
            vec![
                FieldOrder { field: "time", order: SortOrder::Desc },
                FieldOrder { field: "action", order: SortOrder::Asc },
            ]
        );
    }

    #[test]
    fn sort_rejects_bad_elements() {
        assert_eq!(parse_sort(":asc"), Err(FilterError::EmptySortField(":asc".to_string())));
        assert_eq!(
            parse_sort("project_id"),
            Err(FilterError::UnknownSortField("project_id".to_string()))
        );
        assert_eq!(
            parse_sort("time:"),
            Err(FilterError::EmptySortDirection("time:".to_string()))
        );
        assert_eq!(
            parse_sort("time:up"),
            Err(FilterError::InvalidSortDirection("up".to_string()))
        );
    }

    #[test]
    fn sort_splits_on_first_colon_only() {
        assert_eq!(
            parse_sort("time:desc:extra"),
            Err(FilterError::InvalidSortDirection("desc:extra".to_string()))
        );
    }

    #[test]
    fn deprecated_sort_fields_are_accepted() {
        let sort = parse_sort("resource_type:desc,event_type").unwrap();
        assert_eq!(sort[0].field, "resource_type");
        assert_eq!(sort[1].field, "event_type");
    }

    #[test]
    fn time_accepts_all_formats_and_normalizes() {
        let bounds = parse_time(
            "gte:2024-01-01T00:00:00Z,lt:2024-02-01T00:00:00+0100,lte:2024-03-01T12:30:00",
        )
        .unwrap();
        assert_eq!(bounds[&TimeOp::Gte], "2024-01-01T00:00:00Z");
        assert_eq!(bounds[&TimeOp::Lt], "2024-01-31T23:00:00Z");
        assert_eq!(bounds[&TimeOp::Lte], "2024-03-01T12:30:00Z");
    }

    #[test]
    fn time_keeps_distinct_operators() {
        let bounds = parse_time("gt:2024-01-01T00:00:00Z,lt:2024-01-02T00:00:00Z").unwrap();
        assert_eq!(bounds.len(), 2);
        assert!(bounds.contains_key(&TimeOp::Gt));
        assert!(bounds.contains_key(&TimeOp::Lt));
    }

    #[test]
    fn repeated_time_operator_is_rejected() {
        assert_eq!(
            parse_time("lt:2024-01-01T00:00:00Z,lt:2024-02-01T00:00:00Z"),
            Err(FilterError::DuplicateTimeOperator("lt".to_string()))
        );
    }

    #[test]
    fn time_rejects_malformed_elements() {
        assert_eq!(
            parse_time("2024-01-01"),
            Err(FilterError::MalformedTimeBound("2024-01-01".to_string()))
        );
        assert!(matches!(
            parse_time(":2024-01-01T00:00:00Z"),
            Err(FilterError::EmptyTimeOperator(_))
        ));
        assert_eq!(
            parse_time("before:2024-01-01T00:00:00Z"),
            Err(FilterError::UnknownTimeOperator("before".to_string()))
        );
        assert_eq!(parse_time("lt:"), Err(FilterError::EmptyTimestamp("lt".to_string())));
        assert_eq!(
            parse_time("lt:yesterday"),
            Err(FilterError::InvalidTimestamp("yesterday".to_string()))
        );
        assert!(matches!(
            parse_time("lt:2024-01-01T00:00:00Z,"),
            Err(FilterError::MalformedTimeBound(_))
        ));
    }

    #[test]
    fn pagination_defaults_and_validation() {
        let limits = Limits::default();
        let filter = parse_filter(&params(""), &limits).unwrap();
        assert_eq!(filter.offset, 0);
        assert_eq!(filter.limit, 10);

        let err = parse_filter(&params("limit=ten"), &limits).unwrap_err();
        assert_eq!(
            err,
            FilterError::InvalidInteger { param: "limit", value: "ten".to_string() }
        );
        assert!(parse_filter(&params("offset=-1"), &limits).is_err());
    }

    #[test]
    fn window_larger_than_backend_maximum_is_rejected() {
        let limits = Limits { max_result_window: 100, ..Limits::default() };
        assert!(parse_filter(&params("offset=90&limit=10"), &limits).is_ok());
        assert_eq!(
            parse_filter(&params("offset=91&limit=10"), &limits),
            Err(FilterError::WindowExceeded { max: 100 })
        );
    }

    #[test]
    fn legacy_parameter_names_are_concatenated() {
        let limits = Limits::default();
        let filter = parse_filter(&params("source=service/compute"), &limits).unwrap();
        assert_eq!(filter.observer_type, "service/compute");

        let filter = parse_filter(
            &params("observer_type=service/compute&source=service/network"),
            &limits,
        )
        .unwrap();
        assert_eq!(filter.observer_type, "service/computeservice/network");

        let filter = parse_filter(&params("user_name=u-1&event_type=create"), &limits).unwrap();
        assert_eq!(filter.initiator_id, "u-1");
        assert_eq!(filter.action, "create");
    }

    #[test]
    fn details_is_a_presence_flag() {
        let limits = Limits::default();
        assert!(parse_filter(&params("details"), &limits).unwrap().details);
        assert!(parse_filter(&params("details=false"), &limits).unwrap().details);
        assert!(!parse_filter(&params("limit=5"), &limits).unwrap().details);
    }

    #[test]
    fn first_failure_wins() {
        let limits = Limits::default();
        let err = parse_filter(&params("sort=bogus&time=lt:nope&limit=x"), &limits).unwrap_err();
        assert_eq!(err, FilterError::UnknownSortField("bogus".to_string()));
    }

    #[test]
    fn attribute_filter_defaults_and_bounds() {
        let limits = Limits::default();
        let filter = parse_attribute_filter("target_type", &params(""), &limits).unwrap();
        assert_eq!(filter.max_depth, 0);
        assert_eq!(filter.limit, limits.attribute_default_limit);

        let filter =
            parse_attribute_filter("target_type", &params("max_depth=2&limit=3"), &limits).unwrap();
        assert_eq!((filter.max_depth, filter.limit), (2, 3));

        assert!(matches!(
            parse_attribute_filter("target_type", &params("limit=0"), &limits),
            Err(FilterError::LimitOutOfRange { .. })
        ));
        assert!(matches!(
            parse_attribute_filter("target_type", &params("max_depth=deep"), &limits),
            Err(FilterError::InvalidInteger { param: "max_depth", .. })
        ));
    }
}
