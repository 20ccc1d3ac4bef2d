//! In-process channel adapters

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{Publisher, RemoteError, Subscriber};
use crate::envelope::Envelope;

/// Subscriber fed through an mpsc channel
///
/// Exhausted once every sender is dropped and the channel is drained.
pub struct ChannelSubscriber {
    rx: mpsc::Receiver<Envelope>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the sender that feeds it
    pub fn new(capacity: usize) -> (mpsc::Sender<Envelope>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }

    pub fn from_receiver(rx: mpsc::Receiver<Envelope>) -> Self {
        Self { rx }
    }
}

#[async_trait]
impl Subscriber for ChannelSubscriber {
    fn name(&self) -> &str {
        "channel"
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, RemoteError> {
        Ok(self.rx.recv().await)
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        self.rx.close();
        Ok(())
    }
}

/// Publisher that hands envelopes to an mpsc channel
pub struct ChannelPublisher {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiver that collects its output
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn from_sender(tx: mpsc::Sender<Envelope>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    fn name(&self) -> &str {
        "channel"
    }

    async fn publish(&mut self, envelope: &Envelope) -> Result<(), RemoteError> {
        self.tx
            .send(envelope.clone())
            .await
            .map_err(|_| RemoteError::Closed)
    }
}
