use thiserror::Error;

/// Failures the connector distinguishes between when deciding whether to
/// keep polling.
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// Invalid startup configuration. Always fatal.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The queue service rejected our credentials or permissions.
    #[error("{operation} failed: not authorized: {message}")]
    Auth {
        operation: &'static str,
        message: String,
    },

    /// Timeouts, throttling and temporary unavailability.
    #[error("{operation} failed: {message}")]
    TransientQueue {
        operation: &'static str,
        message: String,
    },

    /// Anything the queue client could not place in a known category.
    #[error("{operation} failed with an unclassified error: {message}")]
    Unclassified {
        operation: &'static str,
        message: String,
    },

    /// A single message could not be turned into an event.
    #[error("malformed message {message_id}: {reason}")]
    MalformedMessage { message_id: String, reason: String },
}

impl ConnectorError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether the connector has to stop instead of retrying.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Auth { .. })
    }
}

/// Raised by an event emitter when the downstream consumer did not take the event.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("event consumer is closed")]
    Closed,

    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),
}
