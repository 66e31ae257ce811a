use async_trait::async_trait;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client as SqsClient;
use log::{debug, info};
use tokio::sync::OnceCell;

use crate::error::ConnectorError;
use crate::models::{Message, QueueConfig};
use crate::services::backoff::{classify_code, ErrorKind};
use crate::services::queue::QueueClient;

/// Most messages SQS returns from a single receive call
pub const MAX_MESSAGES: i32 = 10;

/// SQS adapter for the poll loop
pub struct SqsQueueClient {
    client: SqsClient,
    queue_id: String,
    compartment_id: String,
    queue_url: OnceCell<String>,
}

impl SqsQueueClient {
    /// Create a queue client for the configured queue.
    ///
    /// `queue_id` may be a queue URL or a queue name. Names are resolved with
    /// GetQueueUrl on first use, scoped to `compartment_id` when it is an AWS
    /// account id, so resolution failures go through the poll loop's retry
    /// policy like any other poll error.
    pub fn new(client: SqsClient, config: &QueueConfig) -> Result<Self, ConnectorError> {
        if config.limit > MAX_MESSAGES {
            return Err(ConnectorError::config(format!(
                "limit must be at most {} for SQS, got {}",
                MAX_MESSAGES, config.limit
            )));
        }

        let queue_url = if is_queue_url(&config.queue_id) {
            info!("Using queue: {}", config.queue_id);
            OnceCell::from(config.queue_id.clone())
        } else {
            OnceCell::new()
        };

        Ok(Self {
            client,
            queue_id: config.queue_id.clone(),
            compartment_id: config.compartment_id.clone(),
            queue_url,
        })
    }

    async fn queue_url(&self) -> Result<&str, ConnectorError> {
        let url = self
            .queue_url
            .get_or_try_init(|| async {
                let url = self.resolve_queue_url().await?;
                info!("Resolved queue {} to {}", self.queue_id, url);
                Ok::<_, ConnectorError>(url)
            })
            .await?;
        Ok(url.as_str())
    }

    async fn resolve_queue_url(&self) -> Result<String, ConnectorError> {
        debug!("Resolving URL of queue: {}", self.queue_id);

        let owner = is_account_id(&self.compartment_id).then(|| self.compartment_id.clone());
        let output = self
            .client
            .get_queue_url()
            .queue_name(&self.queue_id)
            .set_queue_owner_aws_account_id(owner)
            .send()
            .await
            .map_err(|e| classify("resolve queue url", e))?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| ConnectorError::config(format!("queue {} has no URL", self.queue_id)))
    }
}

#[async_trait]
impl QueueClient for SqsQueueClient {
    async fn poll(
        &self,
        limit: i32,
        wait_seconds: u32,
        visibility_seconds: u32,
    ) -> Result<Vec<Message>, ConnectorError> {
        let queue_url = self.queue_url().await?;
        debug!("Polling for messages from queue: {}", queue_url);

        let mut request = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(limit.min(MAX_MESSAGES))
            .wait_time_seconds(to_i32(wait_seconds))
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .message_attribute_names("All");
        if visibility_seconds > 0 {
            request = request.visibility_timeout(to_i32(visibility_seconds));
        }

        let output = request.send().await.map_err(|e| classify("poll", e))?;

        let messages = output
            .messages()
            .iter()
            .cloned()
            .map(Message::from)
            .collect::<Vec<Message>>();

        debug!("Received {} messages from SQS", messages.len());
        Ok(messages)
    }

    async fn acknowledge(&self, message: &Message) -> Result<(), ConnectorError> {
        debug!("Deleting message {} from queue", message.id);

        self.client
            .delete_message()
            .queue_url(self.queue_url().await?)
            .receipt_handle(&message.receipt_handle)
            .send()
            .await
            .map_err(|e| classify("acknowledge", e))?;

        Ok(())
    }

    async fn extend_visibility(
        &self,
        message: &Message,
        seconds: u32,
    ) -> Result<(), ConnectorError> {
        debug!("Extending visibility of message {} by {}s", message.id, seconds);

        self.client
            .change_message_visibility()
            .queue_url(self.queue_url().await?)
            .receipt_handle(&message.receipt_handle)
            .visibility_timeout(to_i32(seconds))
            .send()
            .await
            .map_err(|e| classify("extend visibility", e))?;

        Ok(())
    }
}

/// Map an SDK failure onto the connector's error taxonomy
fn classify<E, R>(operation: &'static str, err: SdkError<E, R>) -> ConnectorError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    let kind = match &err {
        SdkError::TimeoutError(_) | SdkError::ResponseError(_) => ErrorKind::Transient,
        SdkError::DispatchFailure(failure) if failure.is_io() || failure.is_timeout() => {
            ErrorKind::Transient
        }
        // Identity resolution and auth scheme selection fail here
        SdkError::DispatchFailure(failure) if failure.is_other() => ErrorKind::Auth,
        SdkError::ServiceError(service) => classify_code(service.err().code()),
        SdkError::ConstructionFailure(_) => {
            return ConnectorError::config(format!("{} request invalid: {}", operation, message))
        }
        _ => ErrorKind::Unknown,
    };
    kind.into_error(operation, message)
}

fn is_queue_url(queue_id: &str) -> bool {
    queue_id.starts_with("https://") || queue_id.starts_with("http://")
}

fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.bytes().all(|b| b.is_ascii_digit())
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Config;
    use aws_sdk_sqs::config::retry::RetryConfig;
    use aws_sdk_sqs::config::{BehaviorVersion, Credentials, Region};

    /// An endpoint nothing listens on
    fn refused_endpoint() -> String {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        format!("http://127.0.0.1:{}", port)
    }

    fn sqs_client(credentials: Option<Credentials>) -> SqsClient {
        let mut builder = aws_sdk_sqs::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("eu-west-1"))
            .endpoint_url(refused_endpoint())
            .retry_config(RetryConfig::disabled());
        if let Some(credentials) = credentials {
            builder = builder.credentials_provider(credentials);
        }
        SqsClient::from_conf(builder.build())
    }

    fn queue_config(queue_id: &str) -> QueueConfig {
        let mut config = Config::default().queue;
        config.queue_id = queue_id.to_string();
        config.compartment_id = "123456789012".to_string();
        config.region = "eu-west-1".to_string();
        config
    }

    #[test]
    fn test_queue_id_forms() {
        assert!(is_queue_url(
            "https://sqs.eu-west-1.amazonaws.com/123456789012/events"
        ));
        assert!(is_queue_url("http://localhost:4566/000000000000/events"));
        assert!(!is_queue_url("events"));
    }

    #[test]
    fn test_compartment_as_account_id() {
        assert!(is_account_id("123456789012"));
        assert!(!is_account_id("ocid1.compartment.oc1..example"));
        assert!(!is_account_id("12345"));
    }

    #[test]
    fn test_timeout_conversion_saturates() {
        assert_eq!(to_i32(30), 30);
        assert_eq!(to_i32(u32::MAX), i32::MAX);
    }

    #[test]
    fn test_limit_above_service_cap_rejected() {
        let mut config = queue_config("events");
        config.limit = MAX_MESSAGES + 1;

        let result = SqsQueueClient::new(sqs_client(None), &config);
        assert!(matches!(result, Err(ConnectorError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_missing_credentials_is_auth_error() {
        let config = queue_config("http://127.0.0.1:9/123456789012/events");
        let client = SqsQueueClient::new(sqs_client(None), &config).unwrap();

        let err = client.poll(1, 0, 0).await.unwrap_err();

        assert!(
            matches!(err, ConnectorError::Auth { operation: "poll", .. }),
            "unexpected error: {:?}",
            err
        );
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transient() {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "test");
        let config = queue_config(&format!("{}/123456789012/events", refused_endpoint()));
        let client = SqsQueueClient::new(sqs_client(Some(credentials)), &config).unwrap();

        let err = client.poll(1, 0, 0).await.unwrap_err();

        assert!(
            matches!(err, ConnectorError::TransientQueue { operation: "poll", .. }),
            "unexpected error: {:?}",
            err
        );
    }

    #[tokio::test]
    async fn test_queue_name_resolution_failure_is_retryable() {
        let credentials = Credentials::new("AKIDEXAMPLE", "secret", None, None, "test");

        // Creating the client does not touch the network
        let client = SqsQueueClient::new(sqs_client(Some(credentials)), &queue_config("events"))
            .unwrap();

        let err = client.poll(1, 0, 0).await.unwrap_err();

        assert!(
            matches!(
                err,
                ConnectorError::TransientQueue {
                    operation: "resolve queue url",
                    ..
                }
            ),
            "unexpected error: {:?}",
            err
        );
        assert!(!err.is_fatal());
        // Resolution is attempted again on the next poll
        assert!(client.queue_url.get().is_none());
    }
}
