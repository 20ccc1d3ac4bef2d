//! Envelope wire format
//!
//! The unit exchanged between pipeline stages: a JSON object carrying the
//! topic and an arbitrary JSON payload. Stages pass envelopes to each other
//! already encoded, so every stage decodes what it receives.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Errors raised while decoding an envelope
#[derive(Debug)]
pub enum EnvelopeError {
    /// Not valid JSON, or not shaped like an envelope
    Decode(serde_json::Error),
    /// Encoding failed
    Encode(serde_json::Error),
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::Decode(e) => write!(f, "envelope decode error: {}", e),
            EnvelopeError::Encode(e) => write!(f, "envelope encode error: {}", e),
        }
    }
}

impl std::error::Error for EnvelopeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EnvelopeError::Decode(e) | EnvelopeError::Encode(e) => Some(e),
        }
    }
}

/// A message in flight: `{"topic": "...", "payload": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `/`-delimited topic
    pub topic: String,
    /// Message body; only object payloads are transformable
    pub payload: Value,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: Value) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Decode an envelope from its JSON encoding
    ///
    /// Both keys are required; additional keys are ignored.
    pub fn decode(raw: &[u8]) -> Result<Self, EnvelopeError> {
        serde_json::from_slice(raw).map_err(EnvelopeError::Decode)
    }

    /// Encode the envelope as compact JSON
    pub fn encode(&self) -> Result<Bytes, EnvelopeError> {
        serde_json::to_vec(self)
            .map(Bytes::from)
            .map_err(EnvelopeError::Encode)
    }
}
