pub mod config;
pub mod event;
pub mod message;

pub use config::{Config, ContentFormat, HealthConfig, QueueConfig};
pub use event::{Event, EventMetadata, EventSource};
pub use message::Message;
