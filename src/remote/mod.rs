//! Message Source and Sink Abstractions
//!
//! The relay does not own its connections. A [`Subscriber`] hands the
//! pipeline envelopes taken from the local bus, and a [`Publisher`] delivers
//! finished envelopes to the remote endpoint. Connection lifecycle, TLS,
//! reconnects and delivery guarantees belong to the implementations.
//!
//! Shipped implementations:
//! - [`ChannelSubscriber`] / [`ChannelPublisher`]: in-process channels
//! - [`JsonLinesSubscriber`] / [`JsonLinesPublisher`]: newline-delimited JSON
//!   envelopes over any async reader/writer (stdin/stdout for the binary)

mod channel;
mod lines;

pub use channel::{ChannelPublisher, ChannelSubscriber};
pub use lines::{JsonLinesPublisher, JsonLinesSubscriber};

use std::fmt;

use async_trait::async_trait;

use crate::envelope::Envelope;

/// Error type for subscriber and publisher operations
#[derive(Debug)]
pub enum RemoteError {
    /// Connection to the bus or endpoint failed or was lost
    ConnectionLost(String),
    /// Remote side rejected the operation
    Rejected(String),
    /// Operation timed out
    Timeout,
    /// The source or sink is closed for good
    Closed,
    /// IO error
    Io(std::io::Error),
    /// Other error
    Other(String),
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemoteError::ConnectionLost(msg) => write!(f, "Connection lost: {}", msg),
            RemoteError::Rejected(msg) => write!(f, "Rejected: {}", msg),
            RemoteError::Timeout => write!(f, "Operation timed out"),
            RemoteError::Closed => write!(f, "Closed"),
            RemoteError::Io(e) => write!(f, "IO error: {}", e),
            RemoteError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for RemoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RemoteError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(e: std::io::Error) -> Self {
        RemoteError::Io(e)
    }
}

/// Source of envelopes from the local bus
///
/// One envelope per bus message, with the topic taken verbatim from the
/// broker.
#[async_trait]
pub trait Subscriber: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Wait for the next envelope
    ///
    /// `Ok(None)` means the source is exhausted. The pipeline polls with a
    /// timeout, so this future must be cancel-safe: dropping it before it
    /// completes must not lose a message.
    async fn recv(&mut self) -> Result<Option<Envelope>, RemoteError>;

    /// Release the source (called once, after the last `recv`)
    async fn close(&mut self) -> Result<(), RemoteError> {
        Ok(())
    }
}

/// Sink delivering envelopes to the remote endpoint
///
/// Implementations provide at-least-once delivery of the topic/payload pair
/// and handle their own retries and reconnects.
#[async_trait]
pub trait Publisher: Send {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Deliver one envelope
    async fn publish(&mut self, envelope: &Envelope) -> Result<(), RemoteError>;

    /// Flush and release the sink (called once, after the last `publish`)
    async fn close(&mut self) -> Result<(), RemoteError> {
        Ok(())
    }
}
