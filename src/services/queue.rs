use async_trait::async_trait;
use log::debug;
use std::sync::Arc;

use crate::error::ConnectorError;
use crate::models::Message;

/// The operations the poll loop needs from a queue service.
///
/// Implementations map their SDK errors into [`ConnectorError`] so the loop
/// can decide between retrying and stopping without knowing the SDK.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive up to `limit` messages, waiting at most `wait_seconds` for the
    /// first one. Received messages stay hidden for `visibility_seconds`
    /// (0 keeps the queue default).
    async fn poll(
        &self,
        limit: i32,
        wait_seconds: u32,
        visibility_seconds: u32,
    ) -> Result<Vec<Message>, ConnectorError>;

    /// Delete a message so it is never redelivered.
    async fn acknowledge(&self, message: &Message) -> Result<(), ConnectorError>;

    /// Keep a message hidden from other consumers for another `seconds`.
    async fn extend_visibility(
        &self,
        message: &Message,
        seconds: u32,
    ) -> Result<(), ConnectorError> {
        debug!(
            "Queue client cannot extend visibility, message {} keeps its original timeout ({}s requested)",
            message.id, seconds
        );
        Ok(())
    }
}

#[async_trait]
impl<T: QueueClient + ?Sized> QueueClient for Arc<T> {
    async fn poll(
        &self,
        limit: i32,
        wait_seconds: u32,
        visibility_seconds: u32,
    ) -> Result<Vec<Message>, ConnectorError> {
        (**self).poll(limit, wait_seconds, visibility_seconds).await
    }

    async fn acknowledge(&self, message: &Message) -> Result<(), ConnectorError> {
        (**self).acknowledge(message).await
    }

    async fn extend_visibility(
        &self,
        message: &Message,
        seconds: u32,
    ) -> Result<(), ConnectorError> {
        (**self).extend_visibility(message, seconds).await
    }
}
