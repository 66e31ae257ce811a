use log::{debug, error, info, warn};
use tokio::time::Instant;

use crate::error::ConnectorError;
use crate::models::{Message, QueueConfig};
use crate::services::backoff::{Action, ErrorPolicy};
use crate::services::emitter::EventEmitter;
use crate::services::mapper::MessageMapper;
use crate::services::queue::QueueClient;
use crate::services::shutdown::Shutdown;

/// Counts for one processed batch
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub received: usize,
    pub emitted: usize,
    pub acknowledged: usize,
    pub malformed: usize,
    pub failed: usize,
}

/// Drives the poll, emit and acknowledge cycle for a single queue
pub struct Poller<Q, E> {
    config: QueueConfig,
    client: Q,
    emitter: E,
    mapper: MessageMapper,
    shutdown: Shutdown,
}

impl<Q, E> Poller<Q, E>
where
    Q: QueueClient,
    E: EventEmitter,
{
    pub fn new(
        config: QueueConfig,
        client: Q,
        emitter: E,
        shutdown: Shutdown,
    ) -> Result<Self, ConnectorError> {
        config.validate()?;
        let mapper = MessageMapper::new(&config);
        Ok(Self {
            config,
            client,
            emitter,
            mapper,
            shutdown,
        })
    }

    /// Poll until shutdown is requested or a fatal error occurs
    pub async fn run(&self) -> Result<(), ConnectorError> {
        info!("Starting queue event source for queue: {}", self.config.queue_id);

        let result = self.poll_loop().await;
        match &result {
            Ok(()) => info!("Queue event source stopped"),
            Err(e) => error!("Queue event source stopped on fatal error: {}", e),
        }
        result
    }

    async fn poll_loop(&self) -> Result<(), ConnectorError> {
        let mut policy = ErrorPolicy::from_config(&self.config);

        while !self.shutdown.is_triggered() {
            let polled = self
                .client
                .poll(
                    self.config.limit,
                    self.config.timeout_seconds,
                    self.config.visibility_timeout_seconds,
                )
                .await;

            let delay = match polled {
                Ok(messages) => {
                    policy.on_success();
                    self.process_batch(messages).await?;
                    self.config.polling_interval()
                }
                Err(e) => match policy.on_error(&e) {
                    Action::Retry(delay) => delay,
                    Action::Stop => return Err(e),
                },
            };

            if !self.shutdown.sleep(delay).await {
                break;
            }
        }

        Ok(())
    }

    /// Emit every message of a batch in order, acknowledging each one right
    /// after its event was taken.
    ///
    /// Only a fatal error from the queue client aborts the batch; messages
    /// left unacknowledged are redelivered by the queue.
    pub async fn process_batch(
        &self,
        messages: Vec<Message>,
    ) -> Result<BatchOutcome, ConnectorError> {
        let mut outcome = BatchOutcome {
            received: messages.len(),
            ..Default::default()
        };
        if messages.is_empty() {
            debug!("No messages available");
            return Ok(outcome);
        }
        info!("Received {} messages from queue", messages.len());

        let renew_every = self.config.visibility_timeout() / 2;
        let mut renew_at = (self.config.visibility_timeout_seconds > 0)
            .then(|| Instant::now() + renew_every);

        for (index, message) in messages.iter().enumerate() {
            if self.shutdown.is_triggered() {
                info!(
                    "Shutdown requested, leaving {} messages for redelivery",
                    messages.len() - index
                );
                break;
            }

            if let Some(deadline) = renew_at {
                if Instant::now() >= deadline {
                    self.extend_visibility(&messages[index..]).await?;
                    renew_at = Some(Instant::now() + renew_every);
                }
            }

            let event = match self.mapper.map(message) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping message: {}", e);
                    outcome.malformed += 1;
                    continue;
                }
            };

            if let Err(e) = self.emitter.emit(event).await {
                error!("Failed to emit event for message {}: {}", message.id, e);
                outcome.failed += 1;
                continue;
            }
            outcome.emitted += 1;

            if self.config.auto_acknowledge {
                match self.client.acknowledge(message).await {
                    Ok(()) => {
                        debug!("Acknowledged message {}", message.id);
                        outcome.acknowledged += 1;
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => error!("Failed to acknowledge message {}: {}", message.id, e),
                }
            }
        }

        info!(
            "Processed batch: {} emitted, {} acknowledged, {} malformed, {} failed",
            outcome.emitted, outcome.acknowledged, outcome.malformed, outcome.failed
        );
        Ok(outcome)
    }

    async fn extend_visibility(&self, pending: &[Message]) -> Result<(), ConnectorError> {
        let seconds = self.config.visibility_timeout_seconds;
        debug!("Extending visibility of {} pending messages", pending.len());

        for message in pending {
            match self.client.extend_visibility(message, seconds).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => warn!(
                    "Failed to extend visibility of message {}: {}",
                    message.id, e
                ),
            }
        }
        Ok(())
    }
}
