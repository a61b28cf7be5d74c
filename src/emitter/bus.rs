//! Bus gateway: publish with its own retry+breaker budget, scoped to a
//! pseudo-host `"bus"` distinct from the fetch engine's hosts.
//!
//! Real NATS/Kafka wire protocols are out of scope; [`BusPublisher`] is
//! the seam an integrator plugs a real client into. [`NullPublisher`] and
//! [`LoggingPublisher`] are the two publishers this crate ships.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::circuit_breaker::CircuitBreaker;
use crate::error::{ErrorKind, FetchError};
use crate::retry::RetryPolicy;

use super::envelope::Envelope;

const BUS_HOST: &str = "bus";

#[async_trait]
pub trait BusPublisher: Send + Sync {
    async fn publish_one(&self, topic: &str, envelope: &Envelope) -> Result<(), FetchError>;
}

/// Discards every envelope successfully; used when `bus.enabled = false`.
pub struct NullPublisher;

#[async_trait]
impl BusPublisher for NullPublisher {
    async fn publish_one(&self, _topic: &str, _envelope: &Envelope) -> Result<(), FetchError> {
        Ok(())
    }
}

/// Logs each envelope at `info` instead of transporting it; useful for
/// local runs and the `soak` CLI subcommand.
pub struct LoggingPublisher;

#[async_trait]
impl BusPublisher for LoggingPublisher {
    async fn publish_one(&self, topic: &str, envelope: &Envelope) -> Result<(), FetchError> {
        tracing::info!(
            topic,
            message_id = %envelope.message_id,
            partition_key = %envelope.partition_key,
            bytes = envelope.payload.len(),
            "publishing envelope"
        );
        Ok(())
    }
}

/// Wraps a [`BusPublisher`] with its own retry policy and circuit breaker,
/// scoped to the bus host rather than any HTTP host.
pub struct BusGateway {
    publisher: Arc<dyn BusPublisher>,
    retry: RetryPolicy,
    breaker: Arc<CircuitBreaker>,
}

impl BusGateway {
    pub fn new(publisher: Arc<dyn BusPublisher>, retry: RetryPolicy, breaker: Arc<CircuitBreaker>) -> Self {
        Self { publisher, retry, breaker }
    }

    pub async fn publish(&self, topic: &str, envelope: &Envelope) -> Result<(), FetchError> {
        let mut attempt = 0u32;
        loop {
            if !self.breaker.try_admit(BUS_HOST) {
                return Err(FetchError::new(ErrorKind::CircuitOpen, "bus circuit breaker is open")
                    .with_endpoint(topic)
                    .with_attempt(attempt));
            }
            match self.publisher.publish_one(topic, envelope).await {
                Ok(()) => {
                    self.breaker.record(BUS_HOST, true);
                    return Ok(());
                }
                Err(err) => {
                    self.breaker.record(BUS_HOST, false);
                    let err = err.with_endpoint(topic).with_attempt(attempt);
                    if !self.retry.should_retry(attempt, err.kind) {
                        return Err(FetchError::new(ErrorKind::PublishError, err.message)
                            .with_endpoint(topic)
                            .with_attempt(attempt));
                    }
                    let delay = self.retry.delay(attempt, None);
                    tokio::time::sleep(delay.min(Duration::from_secs(5))).await;
                    attempt += 1;
                }
            }
        }
    }
}
