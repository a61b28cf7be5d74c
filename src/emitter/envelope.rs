//! Envelope construction: message IDs, topic/partition-key formatting,
//! payload chunking.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{ErrorKind, FetchError};
use crate::identity::Security;

#[derive(Debug, Clone)]
pub struct Envelope {
    pub message_id: Uuid,
    pub schema_fqdn: String,
    pub schema_version: String,
    pub content_type: String,
    pub produced_at: DateTime<Utc>,
    pub producer: String,
    pub source: String,
    pub run_id: String,
    pub trace_id: Option<String>,
    pub partition_key: String,
    pub extensions: Option<serde_json::Value>,
    pub payload: Vec<u8>,
    pub chunk_index: Option<u32>,
    pub total_chunks: Option<u32>,
}

impl Envelope {
    fn validate(&self) -> Result<(), FetchError> {
        if self.schema_fqdn.is_empty() || self.producer.is_empty() || self.source.is_empty() {
            return Err(FetchError::new(ErrorKind::ValidationError, "envelope fields must be non-empty"));
        }
        if self.partition_key.is_empty() {
            return Err(FetchError::new(ErrorKind::ValidationError, "partition_key must be non-empty"));
        }
        Ok(())
    }
}

/// `{MIC}.{symbol}` or `{symbol}` when MIC is absent.
pub fn partition_key(security: &Security) -> String {
    if security.mic.is_empty() {
        security.symbol.clone()
    } else {
        format!("{}.{}", security.mic, security.symbol)
    }
}

/// `{prefix}.{env}.{domain}.{version}.{MIC}.{symbol}` for market data;
/// `{prefix}.{env}.fundamentals.{version}.{symbol}` for fundamentals.
pub fn topic_for(prefix: &str, env: &str, domain: &str, version: &str, security: &Security) -> String {
    if domain == "fundamentals" {
        format!("{prefix}.{env}.fundamentals.{version}.{}", security.symbol)
    } else if security.mic.is_empty() {
        format!("{prefix}.{env}.{domain}.{version}.{}", security.symbol)
    } else {
        format!("{prefix}.{env}.{domain}.{version}.{}.{}", security.mic, security.symbol)
    }
}

pub struct EnvelopeBuilder {
    pub schema_fqdn: String,
    pub schema_version: String,
    pub content_type: String,
    pub producer: String,
    pub source: String,
    pub run_id: String,
    pub trace_id: Option<String>,
    pub max_payload_bytes: usize,
}

impl EnvelopeBuilder {
    /// Builds one or more envelopes for `payload`, splitting into sequenced
    /// chunked envelopes if it exceeds `max_payload_bytes`.
    pub fn build(
        &self,
        security: &Security,
        payload: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Envelope>, FetchError> {
        let key = partition_key(security);
        if payload.len() <= self.max_payload_bytes {
            let envelope = self.single(key, payload, now, None, None);
            envelope.validate()?;
            return Ok(vec![envelope]);
        }

        let chunks: Vec<Vec<u8>> = payload.chunks(self.max_payload_bytes).map(|c| c.to_vec()).collect();
        let total = chunks.len() as u32;
        let mut envelopes = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.into_iter().enumerate() {
            let envelope = self.single(key.clone(), chunk, now, Some(i as u32), Some(total));
            envelope.validate()?;
            envelopes.push(envelope);
        }
        Ok(envelopes)
    }

    fn single(
        &self,
        partition_key: String,
        payload: Vec<u8>,
        now: DateTime<Utc>,
        chunk_index: Option<u32>,
        total_chunks: Option<u32>,
    ) -> Envelope {
        Envelope {
            message_id: Uuid::now_v7(),
            schema_fqdn: self.schema_fqdn.clone(),
            schema_version: self.schema_version.clone(),
            content_type: self.content_type.clone(),
            produced_at: now,
            producer: self.producer.clone(),
            source: self.source.clone(),
            run_id: self.run_id.clone(),
            trace_id: self.trace_id.clone(),
            partition_key,
            extensions: None,
            payload,
            chunk_index,
            total_chunks,
        }
    }
}
