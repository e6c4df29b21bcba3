//! Decoding of JSON event lists.
//!
//! Event payloads arrive as a list envelope (`{"items": [...]}`) whose items
//! are kept raw until each one is decoded into the caller's event type.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

use crate::error::{HarnessError, HarnessResult};

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    /// `null` and a missing key both mean no items.
    #[serde(default)]
    items: Option<Vec<Box<RawValue>>>,
}

/// Decode every item of a list envelope into `T`, in envelope order.
///
/// An envelope with no items is an error: callers only ask for events when
/// they expect some.
pub fn parse_events<T: DeserializeOwned>(out: &str) -> HarnessResult<Vec<T>> {
    let list: ListEnvelope = serde_json::from_str(out).map_err(HarnessError::EnvelopeDecode)?;
    let items = list.items.unwrap_or_default();
    if items.is_empty() {
        return Err(HarnessError::NoEvents);
    }

    items
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            serde_json::from_str(raw.get())
                .map_err(|source| HarnessError::EventDecode { index, source })
        })
        .collect()
}

/// [`parse_events`] for Kubernetes core/v1 events.
pub fn parse_kube_events(out: &str) -> HarnessResult<Vec<KubeEvent>> {
    parse_events(out)
}

/// Identity of the event object itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub uid: String,
}

/// The object an event is about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectReference {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    pub field_path: String,
}

/// Component that reported the event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventSource {
    pub component: String,
    pub host: String,
}

/// A Kubernetes event as printed by `get events -o json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeEvent {
    #[serde(default)]
    pub metadata: ObjectMeta,
    pub involved_object: ObjectReference,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub message: String,
    /// `Normal` or `Warning`.
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub first_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: EventSource,
}

impl KubeEvent {
    pub fn is_warning(&self) -> bool {
        self.event_type == "Warning"
    }
}
