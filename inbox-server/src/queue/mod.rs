//! RabbitMQ sink for accepted messages.
//!
//! ```text
//! Webhook → Ingestor → inbound_messages queue → storage consumer
//! ```

pub mod publisher;
pub mod types;

pub use publisher::Publisher;
pub use types::{InboundMessage, INBOUND_MESSAGES_QUEUE};
