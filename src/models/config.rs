use serde::Deserialize;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConnectorError;

/// Longest long-poll wait the queue service accepts.
pub const MAX_TIMEOUT_SECONDS: u32 = 20;

/// Upper bound for the polling interval and the retry backoff.
pub const MAX_INTERVAL_SECONDS: f64 = 86_400.0;

/// Application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Queue polling configuration
    pub queue: QueueConfig,
    /// Health check server configuration
    pub health: HealthConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// How a message body is decoded into the event payload
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Keep the body as a string
    Text,
    /// The body must be a JSON document
    Json,
    /// JSON when the body parses, a string otherwise
    Auto,
}

impl FromStr for ContentFormat {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "auto" => Ok(Self::Auto),
            other => Err(ConnectorError::config(format!(
                "unknown content format '{}', expected text, json or auto",
                other
            ))),
        }
    }
}

/// Queue polling configuration
#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    /// Queue to poll (queue URL or queue name)
    pub queue_id: String,
    /// Scoping context of the queue, reported in every event
    pub compartment_id: String,
    /// Service region
    pub region: String,
    /// Named credential profile handed to the SDK
    pub config_profile: String,
    /// Long-poll wait per poll, in seconds
    pub timeout_seconds: u32,
    /// How long received messages stay hidden from other consumers, in seconds
    pub visibility_timeout_seconds: u32,
    /// Maximum number of messages per poll
    pub limit: i32,
    /// Seconds to sleep between poll cycles
    pub polling_interval: f64,
    /// Delete messages once their event was emitted
    pub auto_acknowledge: bool,
    /// Upper bound of the retry backoff, in seconds
    pub max_backoff_seconds: f64,
    /// Body decoding
    pub content_format: ContentFormat,
    /// Top-level key of emitted events
    pub event_key: String,
}

/// Health check server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    /// Host to bind the health check server to
    pub host: String,
    /// Port to bind the health check server to
    pub port: u16,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig {
                queue_id: String::new(),
                compartment_id: String::new(),
                region: String::new(),
                config_profile: String::from("default"),
                timeout_seconds: 20,
                visibility_timeout_seconds: 30,
                limit: 1,
                polling_interval: 5.0,
                auto_acknowledge: true,
                max_backoff_seconds: 60.0,
                content_format: ContentFormat::Text,
                event_key: String::from("oci_queue"),
            },
            health: HealthConfig {
                host: String::from("0.0.0.0"),
                port: 8080,
            },
            logging: LoggingConfig {
                level: String::from("info"),
            },
        }
    }
}

impl Config {
    /// Load and validate the configuration from environment variables
    pub fn from_env() -> Result<Self, ConnectorError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load and validate the configuration from any variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConnectorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        config.queue.queue_id = required(&lookup, "QUEUE_ID")?;
        config.queue.compartment_id = required(&lookup, "QUEUE_COMPARTMENT_ID")?;
        config.queue.region = lookup("QUEUE_REGION")
            .or_else(|| lookup("AWS_REGION"))
            .ok_or_else(|| {
                ConnectorError::config("QUEUE_REGION environment variable not set")
            })?;

        if let Some(profile) = lookup("QUEUE_CONFIG_PROFILE") {
            config.queue.config_profile = profile;
        }
        if let Some(key) = lookup("QUEUE_EVENT_KEY") {
            config.queue.event_key = key;
        }

        config.queue.timeout_seconds = parsed(&lookup, "QUEUE_TIMEOUT_SECONDS", 20)?;
        config.queue.visibility_timeout_seconds =
            parsed(&lookup, "QUEUE_VISIBILITY_TIMEOUT_SECONDS", 30)?;
        config.queue.limit = parsed(&lookup, "QUEUE_LIMIT", 1)?;
        config.queue.polling_interval = parsed(&lookup, "QUEUE_POLLING_INTERVAL", 5.0)?;
        config.queue.auto_acknowledge = parsed(&lookup, "QUEUE_AUTO_ACKNOWLEDGE", true)?;
        config.queue.max_backoff_seconds = parsed(&lookup, "QUEUE_MAX_BACKOFF_SECONDS", 60.0)?;
        config.queue.content_format =
            parsed(&lookup, "QUEUE_CONTENT_FORMAT", ContentFormat::Text)?;

        if let Some(host) = lookup("HEALTH_HOST") {
            config.health.host = host;
        }
        config.health.port = parsed(&lookup, "HEALTH_PORT", 8080)?;

        if let Some(level) = lookup("RUST_LOG") {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConnectorError> {
        self.queue.validate()?;
        self.health.socket_addr()?;
        Ok(())
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConnectorError> {
        for (name, value) in [
            ("queue_id", &self.queue_id),
            ("compartment_id", &self.compartment_id),
            ("region", &self.region),
            ("config_profile", &self.config_profile),
            ("event_key", &self.event_key),
        ] {
            if value.trim().is_empty() {
                return Err(ConnectorError::config(format!("{} must not be empty", name)));
            }
        }

        if self.limit <= 0 {
            return Err(ConnectorError::config(format!(
                "limit must be positive, got {}",
                self.limit
            )));
        }
        if self.timeout_seconds > MAX_TIMEOUT_SECONDS {
            return Err(ConnectorError::config(format!(
                "timeout_seconds must be between 0 and {}, got {}",
                MAX_TIMEOUT_SECONDS, self.timeout_seconds
            )));
        }
        if !(0.0..=MAX_INTERVAL_SECONDS).contains(&self.polling_interval) {
            return Err(ConnectorError::config(format!(
                "polling_interval must be between 0 and {} seconds, got {}",
                MAX_INTERVAL_SECONDS, self.polling_interval
            )));
        }
        if !(self.max_backoff_seconds > 0.0 && self.max_backoff_seconds <= MAX_INTERVAL_SECONDS) {
            return Err(ConnectorError::config(format!(
                "max_backoff_seconds must be positive and at most {}, got {}",
                MAX_INTERVAL_SECONDS, self.max_backoff_seconds
            )));
        }
        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs_f64(self.polling_interval)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs_f64(self.max_backoff_seconds)
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.visibility_timeout_seconds))
    }
}

impl HealthConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConnectorError> {
        format!("{}:{}", self.host, self.port)
            .parse::<SocketAddr>()
            .map_err(|e| {
                ConnectorError::config(format!(
                    "invalid health address {}:{}: {}",
                    self.host, self.port, e
                ))
            })
    }
}

fn required<F>(lookup: &F, name: &str) -> Result<String, ConnectorError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .ok_or_else(|| ConnectorError::config(format!("{} environment variable not set", name)))
}

fn parsed<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConnectorError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConnectorError::config(format!("invalid {} value '{}': {}", name, raw, e))),
        None => Ok(default),
    }
}
