//! Backend-neutral query plans and the translation from [`Filter`].
//!
//! A plan is an immutable value: builder methods consume the plan and
//! return the extended one, so translating the same filter twice always
//! yields equal plans.

use crate::fields::{self, ID_FIELD, TIME_FIELD};
use crate::filter::{AttributeFilter, Filter, SortOrder, TimeOp};

/// One conjunctive condition of a [`QueryPlan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Clause {
    /// Field equals value.
    Term { field: &'static str, value: String },
    /// Field does not equal value. Documents without the field match.
    NotTerm { field: &'static str, value: String },
    /// Field compares to a timestamp.
    Range {
        field: &'static str,
        op: TimeOp,
        value: String,
    },
    /// Backend-native free-text query.
    FullText { query: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortClause {
    pub field: &'static str,
    pub order: SortOrder,
}

/// Whether `scope` is safe to use as a tenant id: ASCII letters, digits,
/// `_` and `-` only. The empty scope (all tenants) is valid.
pub fn is_valid_scope(scope: &str) -> bool {
    scope
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// A search over one tenant's events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// Tenant scope; empty means all tenants.
    pub scope: String,
    /// All clauses must hold.
    pub clauses: Vec<Clause>,
    pub sort: Vec<SortClause>,
    /// Documents to skip.
    pub from: usize,
    /// Documents to return.
    pub size: usize,
}

impl QueryPlan {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            clauses: Vec::new(),
            sort: Vec::new(),
            from: 0,
            size: 0,
        }
    }

    pub fn with_clause(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn with_sort(mut self, field: &'static str, order: SortOrder) -> Self {
        self.sort.push(SortClause { field, order });
        self
    }

    pub fn with_window(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// Plan that fetches a single event by id.
    pub fn lookup(scope: impl Into<String>, event_id: &str) -> Self {
        Self::new(scope)
            .with_clause(Clause::Term {
                field: ID_FIELD,
                value: event_id.to_string(),
            })
            .with_window(0, 1)
    }
}

/// A terms aggregation over one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregationPlan {
    pub scope: String,
    /// Document path to aggregate on.
    pub field: String,
    /// Maximum number of buckets.
    pub size: usize,
}

impl AggregationPlan {
    /// Resolves the attribute name through the alias table. Unknown names
    /// are passed to the backend unchanged.
    pub fn for_attribute(scope: impl Into<String>, filter: &AttributeFilter) -> Self {
        let field = fields::document_path(&filter.query_name)
            .map_or_else(|| filter.query_name.clone(), str::to_string);
        Self {
            scope: scope.into(),
            field,
            size: filter.limit,
        }
    }
}

fn equality(field: &'static str, value: &str) -> Clause {
    match value.strip_prefix('!') {
        Some(negated) => Clause::NotTerm {
            field,
            value: negated.to_string(),
        },
        None => Clause::Term {
            field,
            value: value.to_string(),
        },
    }
}

/// Translates a validated filter into a plan for `scope`.
pub fn translate(filter: &Filter, scope: &str) -> QueryPlan {
    let scalars = [
        ("observer_type", &filter.observer_type),
        ("target_type", &filter.target_type),
        ("target_id", &filter.target_id),
        ("initiator_id", &filter.initiator_id),
        ("initiator_type", &filter.initiator_type),
        ("initiator_name", &filter.initiator_name),
        ("action", &filter.action),
        ("outcome", &filter.outcome),
        ("request_path", &filter.request_path),
    ];

    let mut plan = QueryPlan::new(scope);
    for (name, value) in scalars {
        if value.is_empty() {
            continue;
        }
        if let Some(field) = fields::document_path(name) {
            plan = plan.with_clause(equality(field, value));
        }
    }

    for (op, value) in &filter.time {
        plan = plan.with_clause(Clause::Range {
            field: TIME_FIELD,
            op: *op,
            value: value.clone(),
        });
    }

    if !filter.search.is_empty() {
        plan = plan.with_clause(Clause::FullText {
            query: filter.search.clone(),
        });
    }

    for order in &filter.sort {
        if let Some(field) = fields::document_path(order.field) {
            plan = plan.with_sort(field, order.order);
        }
    }

    plan.with_sort(TIME_FIELD, SortOrder::Desc)
        .with_window(filter.offset, filter.limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FieldOrder;

    #[test]
    fn empty_filter_only_sorts_by_time() {
        let filter = Filter {
            limit: 10,
            ..Filter::default()
        };
        let plan = translate(&filter, "p-1");
        assert_eq!(plan.scope, "p-1");
        assert!(plan.clauses.is_empty());
        assert_eq!(
            plan.sort,
            vec![SortClause { field: "eventTime", order: SortOrder::Desc }]
        );
        assert_eq!((plan.from, plan.size), (0, 10));
    }

    #[test]
    fn bang_prefix_negates() {
        let filter = Filter {
            target_type: "!compute/server".to_string(),
            outcome: "success".to_string(),
            ..Filter::default()
        };
        let plan = translate(&filter, "p-1");
        assert_eq!(
            plan.clauses,
            vec![
                Clause::NotTerm {
                    field: "target.typeURI",
                    value: "compute/server".to_string()
                },
                Clause::Term {
                    field: "outcome",
                    value: "success".to_string()
                },
            ]
        );
    }

    #[test]
    fn time_bounds_and_search_become_clauses() {
        let mut filter = Filter::default();
        filter.time.insert(TimeOp::Gte, "2024-01-01T00:00:00Z".to_string());
        filter.time.insert(TimeOp::Lt, "2024-02-01T00:00:00Z".to_string());
        filter.search = "volume".to_string();

        let plan = translate(&filter, "");
        assert_eq!(plan.clauses.len(), 3);
        assert!(plan.clauses.contains(&Clause::Range {
            field: "eventTime",
            op: TimeOp::Gte,
            value: "2024-01-01T00:00:00Z".to_string()
        }));
        assert!(plan.clauses.contains(&Clause::Range {
            field: "eventTime",
            op: TimeOp::Lt,
            value: "2024-02-01T00:00:00Z".to_string()
        }));
        assert_eq!(
            plan.clauses.last(),
            Some(&Clause::FullText { query: "volume".to_string() })
        );
    }

    #[test]
    fn caller_sorts_come_before_time_tiebreak() {
        let filter = Filter {
            sort: vec![
                FieldOrder { field: "resource_type", order: SortOrder::Asc },
                FieldOrder { field: "time", order: SortOrder::Asc },
            ],
            ..Filter::default()
        };
        let plan = translate(&filter, "p-1");
        assert_eq!(
            plan.sort,
            vec![
                SortClause { field: "target.typeURI", order: SortOrder::Asc },
                SortClause { field: "eventTime", order: SortOrder::Asc },
                SortClause { field: "eventTime", order: SortOrder::Desc },
            ]
        );
    }

    #[test]
    fn translation_is_deterministic() {
        let filter = Filter {
            initiator_id: "u-1".to_string(),
            action: "!read".to_string(),
            search: "delete".to_string(),
            offset: 20,
            limit: 10,
            ..Filter::default()
        };
        assert_eq!(translate(&filter, "p-1"), translate(&filter, "p-1"));
    }

    #[test]
    fn attribute_names_resolve_or_pass_through() {
        let filter = AttributeFilter {
            query_name: "resource_type".to_string(),
            max_depth: 1,
            limit: 50,
        };
        assert_eq!(AggregationPlan::for_attribute("p-1", &filter).field, "target.typeURI");

        let filter = AttributeFilter {
            query_name: "initiator.host.agent".to_string(),
            max_depth: 0,
            limit: 5,
        };
        let plan = AggregationPlan::for_attribute("p-1", &filter);
        assert_eq!(plan.field, "initiator.host.agent");
        assert_eq!(plan.size, 5);
    }

    #[test]
    fn lookup_targets_a_single_id() {
        let plan = QueryPlan::lookup("p-1", "e-9");
        assert_eq!(
            plan.clauses,
            vec![Clause::Term { field: "id", value: "e-9".to_string() }]
        );
        assert_eq!((plan.from, plan.size), (0, 1));
    }

    #[test]
    fn scope_ids_are_restricted_to_safe_characters() {
        assert!(is_valid_scope(""));
        assert!(is_valid_scope("3a4f_b-9C"));
        for bad in ["p-1,p-2", "*", "p/../_all", "p?q", "p#x", "p 1", "prøject"] {
            assert!(!is_valid_scope(bad), "{bad}");
        }
    }
}
