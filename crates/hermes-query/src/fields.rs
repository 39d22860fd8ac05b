//! Field-name tables shared by the parser, translator and aggregator.
//!
//! API callers name fields with flat snake_case names; stored documents use
//! CADF paths. These tables are the only place the two vocabularies meet.

/// API field name to document path.
///
/// `source`, `resource_type`, `resource_name` and `event_type` are the
/// pre-CADF names and stay accepted for older clients.
const FIELD_ALIASES: &[(&str, &str)] = &[
    ("time", "eventTime"),
    ("action", "action"),
    ("outcome", "outcome"),
    ("request_path", "requestPath"),
    ("observer_id", "observer.id"),
    ("observer_name", "observer.name"),
    ("observer_type", "observer.typeURI"),
    ("target_id", "target.id"),
    ("target_name", "target.name"),
    ("target_type", "target.typeURI"),
    ("initiator_id", "initiator.id"),
    ("initiator_name", "initiator.name"),
    ("initiator_type", "initiator.typeURI"),
    ("source", "observer.typeURI"),
    ("resource_type", "target.typeURI"),
    ("resource_name", "target.name"),
    ("event_type", "action"),
];

/// Fields a caller may sort by.
pub const SORTABLE_FIELDS: &[&str] = &[
    "time",
    "initiator_id",
    "observer_type",
    "target_type",
    "target_id",
    "action",
    "outcome",
    "initiator_name",
    "initiator_type",
    "request_path",
    "source",
    "resource_type",
    "resource_name",
    "event_type",
];

/// Document path of the event timestamp.
pub const TIME_FIELD: &str = "eventTime";

/// Document path of the event identifier.
pub const ID_FIELD: &str = "id";

/// Looks up the document path for an API field name.
pub fn document_path(name: &str) -> Option<&'static str> {
    FIELD_ALIASES
        .iter()
        .find(|(api, _)| *api == name)
        .map(|(_, path)| *path)
}

/// Returns the canonical allow-list entry for `name`, if sortable.
pub fn sortable(name: &str) -> Option<&'static str> {
    SORTABLE_FIELDS.iter().copied().find(|field| *field == name)
}
