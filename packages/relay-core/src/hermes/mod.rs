//! Hermes voice assistant protocol.
//!
//! - [`topics`]: topic parsing and construction
//! - [`router`]: turns bus messages into room operations
//! - [`mqtt`]: the MQTT connection feeding the router

pub mod mqtt;
pub mod router;
pub mod topics;

use async_trait::async_trait;

pub use mqtt::MqttBridge;
pub use router::EventRouter;
pub use topics::HermesTopic;

/// Errors raised while routing a bus message.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("Unrecognised topic: {0}")]
    UnknownTopic(String),

    #[error("Malformed payload on {topic}: {reason}")]
    MalformedPayload { topic: String, reason: String },
}

/// Outbound side of the message bus.
#[async_trait]
pub trait BusPublisher: Send + Sync {
    /// Publishes `payload` on `topic`. Failures are logged by the implementor.
    async fn publish(&self, topic: &str, payload: Vec<u8>);
}
