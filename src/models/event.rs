use chrono::{DateTime, Utc};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Delivery details of the message an event was built from
#[derive(Debug, Clone, PartialEq)]
pub struct EventMetadata {
    pub message_id: String,
    /// Lets an external actor acknowledge the message when auto-acknowledge is off
    pub receipt: String,
    pub delivery_count: u32,
    pub received_at: DateTime<Utc>,
    pub created_at: Option<DateTime<Utc>>,
    pub attributes: BTreeMap<String, String>,
}

/// Where an event came from
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EventSource {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub queue_id: String,
    pub compartment_id: String,
    pub region: String,
}

/// The unit handed to the downstream rule engine
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Top-level key consumers match on, e.g. `oci_queue`
    pub key: String,
    pub content: Value,
    pub metadata: EventMetadata,
    pub source: EventSource,
}

#[derive(serde::Serialize)]
struct Body<'a> {
    message_id: &'a str,
    receipt: &'a str,
    content: &'a Value,
    delivery_count: u32,
    created_at: Option<&'a DateTime<Utc>>,
    #[serde(skip_serializing_if = "no_attributes")]
    metadata: &'a BTreeMap<String, String>,
}

fn no_attributes(attributes: &&BTreeMap<String, String>) -> bool {
    attributes.is_empty()
}

#[derive(serde::Serialize)]
struct Meta<'a> {
    source: &'a EventSource,
    received_at: &'a DateTime<Utc>,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = Body {
            message_id: &self.metadata.message_id,
            receipt: &self.metadata.receipt,
            content: &self.content,
            delivery_count: self.metadata.delivery_count,
            created_at: self.metadata.created_at.as_ref(),
            metadata: &self.metadata.attributes,
        };
        let meta = Meta {
            source: &self.source,
            received_at: &self.metadata.received_at,
        };

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(&self.key, &body)?;
        map.serialize_entry("meta", &meta)?;
        map.end()
    }
}
