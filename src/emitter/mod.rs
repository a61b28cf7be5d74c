//! Emitter & bus gateway: envelope construction, payload sizing, topic
//! routing, publish with retry+breaker.

pub mod bus;
pub mod envelope;

pub use bus::{BusGateway, BusPublisher, LoggingPublisher, NullPublisher};
pub use envelope::{partition_key, topic_for, Envelope, EnvelopeBuilder};
