use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::ConnectorError;
use crate::models::{ContentFormat, Event, EventMetadata, EventSource, Message, QueueConfig};

/// Turns queue messages into events for the rule engine
#[derive(Debug, Clone)]
pub struct MessageMapper {
    key: String,
    format: ContentFormat,
    source: EventSource,
}

impl MessageMapper {
    pub fn new(config: &QueueConfig) -> Self {
        Self {
            key: config.event_key.clone(),
            format: config.content_format,
            source: EventSource {
                name: config.event_key.clone(),
                kind: config.event_key.clone(),
                queue_id: config.queue_id.clone(),
                compartment_id: config.compartment_id.clone(),
                region: config.region.clone(),
            },
        }
    }

    /// Map a message received just now
    pub fn map(&self, message: &Message) -> Result<Event, ConnectorError> {
        self.map_at(message, Utc::now())
    }

    pub fn map_at(
        &self,
        message: &Message,
        received_at: DateTime<Utc>,
    ) -> Result<Event, ConnectorError> {
        if message.id.is_empty() {
            return Err(malformed(message, "message has no id"));
        }
        if message.receipt_handle.is_empty() {
            return Err(malformed(message, "message has no receipt handle"));
        }

        let content = self.decode(message)?;

        Ok(Event {
            key: self.key.clone(),
            content,
            metadata: EventMetadata {
                message_id: message.id.clone(),
                receipt: message.receipt_handle.clone(),
                delivery_count: message.delivery_count,
                received_at,
                created_at: message.created_at,
                attributes: message.attributes.clone(),
            },
            source: self.source.clone(),
        })
    }

    fn decode(&self, message: &Message) -> Result<Value, ConnectorError> {
        match self.format {
            ContentFormat::Text => Ok(Value::String(message.content.clone())),
            ContentFormat::Json => serde_json::from_str(&message.content)
                .map_err(|e| malformed(message, &format!("body is not valid JSON: {}", e))),
            ContentFormat::Auto => Ok(serde_json::from_str(&message.content)
                .unwrap_or_else(|_| Value::String(message.content.clone()))),
        }
    }
}

fn malformed(message: &Message, reason: &str) -> ConnectorError {
    let message_id = if message.id.is_empty() {
        "<no id>".to_string()
    } else {
        message.id.clone()
    };
    ConnectorError::MalformedMessage {
        message_id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use chrono::TimeZone;
    use serde_json::json;

    fn mapper(format: ContentFormat) -> MessageMapper {
        let mut config = Config::default().queue;
        config.queue_id = "events".to_string();
        config.compartment_id = "123456789012".to_string();
        config.region = "eu-west-1".to_string();
        config.content_format = format;
        MessageMapper::new(&config)
    }

    #[test]
    fn test_preserves_delivery_metadata() {
        let mut message = Message::new("m-1", "hello", "r-1");
        message.delivery_count = 4;
        let received_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let event = mapper(ContentFormat::Text)
            .map_at(&message, received_at)
            .unwrap();

        assert_eq!(event.key, "oci_queue");
        assert_eq!(event.content, json!("hello"));
        assert_eq!(event.metadata.message_id, "m-1");
        assert_eq!(event.metadata.receipt, "r-1");
        assert_eq!(event.metadata.delivery_count, 4);
        assert_eq!(event.metadata.received_at, received_at);
        assert_eq!(event.source.queue_id, "events");
        assert_eq!(event.source.compartment_id, "123456789012");
    }

    #[test]
    fn test_json_content_decoded() {
        let message = Message::new("m-1", r#"{"host": "web-1", "cpu": 97}"#, "r-1");
        let event = mapper(ContentFormat::Json).map(&message).unwrap();
        assert_eq!(event.content, json!({"host": "web-1", "cpu": 97}));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let message = Message::new("m-1", "not json", "r-1");
        let err = mapper(ContentFormat::Json).map(&message).unwrap_err();
        assert!(matches!(
            err,
            ConnectorError::MalformedMessage { ref message_id, .. } if message_id == "m-1"
        ));
    }

    #[test]
    fn test_auto_falls_back_to_text() {
        let auto = mapper(ContentFormat::Auto);

        let json_message = Message::new("m-1", "[1, 2]", "r-1");
        assert_eq!(auto.map(&json_message).unwrap().content, json!([1, 2]));

        let text_message = Message::new("m-2", "plain text", "r-2");
        assert_eq!(auto.map(&text_message).unwrap().content, json!("plain text"));
    }

    #[test]
    fn test_message_without_receipt_is_malformed() {
        let message = Message::new("m-1", "hello", "");
        assert!(mapper(ContentFormat::Text).map(&message).is_err());

        let message = Message::new("", "hello", "r-1");
        let err = mapper(ContentFormat::Text).map(&message).unwrap_err();
        assert!(err.to_string().contains("<no id>"));
    }
}
