//! Shared types for the Hermes audit query service.
//!
//! This crate holds the CADF event model as it is stored in the search
//! backend, and the reshaped forms the API hands back to callers. Nothing
//! here has behavior beyond construction and (de)serialization; the query
//! engine in `hermes-query` reads these values and never mutates an
//! [`Event`] it did not build itself.
//!
//! # Wire names
//!
//! CADF uses camelCase field names with a few irregular spellings
//! (`typeURI`, `eventTime`). Every struct renames its fields explicitly so
//! the Rust side can stay snake_case.

use serde::{Deserialize, Serialize};

mod list;
pub use list::{EventList, EventSummary, ResourceRef};

/// A single CADF audit event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// CADF schema URI of the event record itself.
    #[serde(rename = "typeURI", default)]
    pub type_uri: String,
    /// Globally unique event identifier.
    #[serde(default)]
    pub id: String,
    /// ISO 8601 timestamp of when the audited action happened.
    #[serde(rename = "eventTime", default)]
    pub event_time: String,
    /// The audited action, e.g. `create/role_assignment`.
    #[serde(default)]
    pub action: String,
    /// CADF event type, usually `activity`.
    #[serde(rename = "eventType", default, skip_serializing_if = "String::is_empty")]
    pub event_type: String,
    /// Outcome of the action: `success`, `failure` or `pending`.
    #[serde(default)]
    pub outcome: String,
    /// Optional reason the action had the outcome it had.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    /// The actor that performed the action.
    #[serde(default)]
    pub initiator: Resource,
    /// The resource the action was performed on.
    #[serde(default)]
    pub target: Resource,
    /// The service that observed and reported the action.
    #[serde(default)]
    pub observer: Resource,
    /// Free-form payloads attached by the observer.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
    /// HTTP path of the API request that triggered the event.
    #[serde(rename = "requestPath", default, skip_serializing_if = "String::is_empty")]
    pub request_path: String,
}

/// An initiator, target or observer of an [`Event`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// CADF taxonomy URI, e.g. `compute/server`.
    #[serde(rename = "typeURI", default)]
    pub type_uri: String,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Network endpoint of the initiator, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<Host>,
    /// Target-scoped attachments (e.g. the request body of an update).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Network host information of an initiator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
}

/// A typed payload attached to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "typeURI", default)]
    pub type_uri: String,
    /// Arbitrary JSON content; observers store strings, objects and arrays.
    #[serde(default)]
    pub content: serde_json::Value,
}

/// The reason code recorded alongside an outcome.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reason {
    #[serde(rename = "reasonType", default)]
    pub reason_type: String,
    #[serde(rename = "reasonCode", default)]
    pub reason_code: String,
}
