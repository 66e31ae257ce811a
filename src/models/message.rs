use aws_sdk_sqs::types::{Message as SqsMessage, MessageSystemAttributeName};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::BTreeMap;

/// A message as delivered by the queue service
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// The message ID, unique per delivery
    pub id: String,
    /// The message body
    pub content: String,
    /// Token required to delete the message or change its visibility
    pub receipt_handle: String,
    /// How many times the queue has handed out this message
    pub delivery_count: u32,
    /// User supplied message attributes
    pub attributes: BTreeMap<String, String>,
    /// When the producer sent the message, if the service reports it
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        content: impl Into<String>,
        receipt_handle: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            receipt_handle: receipt_handle.into(),
            delivery_count: 1,
            attributes: BTreeMap::new(),
            created_at: None,
        }
    }
}

impl From<SqsMessage> for Message {
    fn from(msg: SqsMessage) -> Self {
        let mut delivery_count = 0;
        let mut created_at = None;

        if let Some(attrs) = msg.attributes() {
            if let Some(count) = attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount) {
                delivery_count = count.parse().unwrap_or_default();
            }
            if let Some(sent) = attrs.get(&MessageSystemAttributeName::SentTimestamp) {
                created_at = sent
                    .parse::<i64>()
                    .ok()
                    .and_then(|millis| Utc.timestamp_millis_opt(millis).single());
            }
        }

        // Only string-typed attributes are carried over
        let attributes = msg
            .message_attributes()
            .map(|attrs| {
                attrs
                    .iter()
                    .filter_map(|(key, value)| {
                        value
                            .string_value()
                            .map(|v| (key.clone(), v.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            id: msg.message_id().unwrap_or_default().to_string(),
            content: msg.body().unwrap_or_default().to_string(),
            receipt_handle: msg.receipt_handle().unwrap_or_default().to_string(),
            delivery_count,
            attributes,
            created_at,
        }
    }
}
