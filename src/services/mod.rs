pub mod backoff;
pub mod emitter;
pub mod mapper;
pub mod poller;
pub mod queue;
pub mod shutdown;
pub mod sqs;

pub use backoff::{Action, Backoff, ErrorPolicy};
pub use emitter::{ChannelEmitter, EventEmitter, JsonLinesEmitter};
pub use mapper::MessageMapper;
pub use poller::{BatchOutcome, Poller};
pub use queue::QueueClient;
pub use shutdown::Shutdown;
pub use sqs::SqsQueueClient;
