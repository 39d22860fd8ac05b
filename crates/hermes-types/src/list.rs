//! Response shapes for event listings.

use serde::{Deserialize, Serialize};

use crate::{Attachment, Event, Resource};

/// A resource reduced to the fields shown in listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceRef {
    #[serde(rename = "typeURI")]
    pub type_uri: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl From<&Resource> for ResourceRef {
    fn from(resource: &Resource) -> Self {
        Self {
            type_uri: resource.type_uri.clone(),
            id: resource.id.clone(),
            name: resource.name.clone(),
        }
    }
}

/// One entry of an [`EventList`].
///
/// `attachments` is `None` unless the caller asked for details, in which
/// case the key is present even when the event has no attachments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub id: String,
    #[serde(rename = "eventTime")]
    pub event_time: String,
    pub action: String,
    pub outcome: String,
    #[serde(rename = "requestPath", default, skip_serializing_if = "String::is_empty")]
    pub request_path: String,
    pub initiator: ResourceRef,
    pub target: ResourceRef,
    pub observer: ResourceRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
}

impl EventSummary {
    /// Reshapes a stored event, keeping attachments only when `details` is set.
    pub fn from_event(event: &Event, details: bool) -> Self {
        Self {
            id: event.id.clone(),
            event_time: event.event_time.clone(),
            action: event.action.clone(),
            outcome: event.outcome.clone(),
            request_path: event.request_path.clone(),
            initiator: ResourceRef::from(&event.initiator),
            target: ResourceRef::from(&event.target),
            observer: ResourceRef::from(&event.observer),
            attachments: details.then(|| event.attachments.clone()),
        }
    }
}

/// A page of events plus links to the neighbouring pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<String>,
    pub events: Vec<EventSummary>,
    /// Number of events matching the filter, across all pages.
    pub total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> Event {
        Event {
            id: "e-1".to_string(),
            event_time: "2024-03-01T10:00:00+00:00".to_string(),
            action: "update".to_string(),
            outcome: "success".to_string(),
            target: Resource {
                type_uri: "compute/server".to_string(),
                id: "srv-1".to_string(),
                name: Some("web-01".to_string()),
                project_id: Some("p-1".to_string()),
                ..Default::default()
            },
            attachments: vec![Attachment {
                name: Some("payload".to_string()),
                type_uri: "mime:application/json".to_string(),
                content: serde_json::json!({"flavor": "m1.small"}),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn summary_without_details_omits_attachments_key() {
        let summary = EventSummary::from_event(&sample_event(), false);
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json.get("attachments").is_none());
        assert_eq!(json["target"]["typeURI"], "compute/server");
        assert_eq!(json["target"]["name"], "web-01");
        assert!(json["target"].get("project_id").is_none());
    }

    #[test]
    fn summary_with_details_keeps_attachments() {
        let summary = EventSummary::from_event(&sample_event(), true);
        let attachments = summary.attachments.expect("attachments requested");
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].content["flavor"], "m1.small");
    }

    #[test]
    fn event_list_serializes_urls_without_escaping_ampersands() {
        let list = EventList {
            next: Some("http://h/v1/events?limit=10&offset=10".to_string()),
            previous: None,
            events: Vec::new(),
            total: 25,
        };
        let body = serde_json::to_string(&list).unwrap();
        assert!(body.contains("limit=10&offset=10"));
        assert!(!body.contains("\\u0026"));
        assert!(!body.contains("previous"));
    }
}
