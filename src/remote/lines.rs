//! Newline-delimited JSON adapters
//!
//! Each line is one envelope: `{"topic": "...", "payload": ...}`.

use async_trait::async_trait;
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines, Stdin, Stdout,
};
use tracing::warn;

use super::{Publisher, RemoteError, Subscriber};
use crate::envelope::Envelope;

/// Subscriber reading one envelope per line
///
/// Blank lines are skipped and lines that are not envelopes are logged and
/// skipped. End of input exhausts the subscriber.
pub struct JsonLinesSubscriber<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSubscriber<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

impl JsonLinesSubscriber<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Subscriber for JsonLinesSubscriber<R> {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, RemoteError> {
        // `next_line` is cancel-safe, and nothing is held across it
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match Envelope::decode(line.as_bytes()) {
                Ok(envelope) => return Ok(Some(envelope)),
                Err(e) => warn!("Skipping input line: {}", e),
            }
        }
        Ok(None)
    }
}

/// Publisher writing one envelope per line
pub struct JsonLinesPublisher<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin + Send> JsonLinesPublisher<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesPublisher<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> Publisher for JsonLinesPublisher<W> {
    fn name(&self) -> &str {
        "json-lines"
    }

    async fn publish(&mut self, envelope: &Envelope) -> Result<(), RemoteError> {
        let encoded = envelope
            .encode()
            .map_err(|e| RemoteError::Other(e.to_string()))?;
        self.writer.write_all(&encoded).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RemoteError> {
        self.writer.flush().await?;
        Ok(())
    }
}
