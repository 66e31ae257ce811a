use async_trait::async_trait;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex};

use crate::error::EmitError;
use crate::models::Event;

/// Hands events to the downstream rule engine.
///
/// The poll loop awaits every call before deciding whether to acknowledge the
/// message, so an `Ok` must mean the consumer has taken ownership of the event.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn emit(&self, event: Event) -> Result<(), EmitError>;
}

#[async_trait]
impl<T: EventEmitter + ?Sized> EventEmitter for Arc<T> {
    async fn emit(&self, event: Event) -> Result<(), EmitError> {
        (**self).emit(event).await
    }
}

/// Emits into an in-process channel read by the rule engine
#[derive(Debug, Clone)]
pub struct ChannelEmitter {
    sender: mpsc::Sender<Event>,
}

impl ChannelEmitter {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl EventEmitter for ChannelEmitter {
    async fn emit(&self, event: Event) -> Result<(), EmitError> {
        self.sender.send(event).await.map_err(|_| EmitError::Closed)
    }
}

/// Writes one JSON document per event, newline separated
pub struct JsonLinesEmitter<W> {
    writer: Mutex<W>,
}

impl<W> JsonLinesEmitter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W> EventEmitter for JsonLinesEmitter<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn emit(&self, event: Event) -> Result<(), EmitError> {
        let mut line = serde_json::to_vec(&event)?;
        line.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&line).await?;
        writer.flush().await?;
        Ok(())
    }
}
