//! Stage contract and worker loops

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::stats::StageStats;
use super::Shutdown;
use crate::envelope::Envelope;
use crate::remote::{Publisher, RemoteError, Subscriber};

/// Result of one stage applying its rule to an envelope
///
/// Every variant carries the envelope to forward: failures forward the
/// input unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A rule applied
    Rewritten(Envelope),
    /// No rule applied
    PassedThrough(Envelope),
    /// A rule applied but failed; the envelope is the unmodified input
    Failed(Envelope),
}

/// A single-responsibility transformation between two queues
///
/// Rule tables are built before the stage starts and never change, so
/// `process` only needs shared access.
pub trait Stage: Send + 'static {
    /// Name used in logs and stats
    fn name(&self) -> &'static str;

    /// Apply the stage's rule to one envelope
    fn process(&self, envelope: Envelope) -> Outcome;
}

/// Encode and push an envelope downstream
///
/// Returns `false` once the downstream queue is gone.
async fn forward(outbound: &mpsc::Sender<Bytes>, envelope: &Envelope, stats: &StageStats) -> bool {
    let encoded = match envelope.encode() {
        Ok(encoded) => encoded,
        Err(e) => {
            warn!("Dropping message on '{}': {}", envelope.topic, e);
            stats.record_dropped();
            return true;
        }
    };

    if outbound.send(encoded).await.is_err() {
        error!("Downstream queue closed, stopping");
        return false;
    }
    true
}

enum Poll {
    Message(Bytes),
    Idle,
    /// Upstream is gone and the queue is drained
    Closed,
}

/// Wait up to one poll interval for the next queued message
async fn poll(inbound: &mut mpsc::Receiver<Bytes>, poll_interval: Duration) -> Poll {
    match timeout(poll_interval, inbound.recv()).await {
        Ok(Some(bytes)) => Poll::Message(bytes),
        Ok(None) => Poll::Closed,
        Err(_) => Poll::Idle,
    }
}

fn decode(bytes: &[u8], stats: &StageStats) -> Option<Envelope> {
    match Envelope::decode(bytes) {
        Ok(envelope) => Some(envelope),
        Err(e) => {
            warn!("Dropping undecodable message: {}", e);
            stats.record_dropped();
            None
        }
    }
}

/// Worker loop for a rewrite stage
///
/// Runs until the inbound queue is closed and drained or the outbound queue
/// is gone. A shutdown request only changes what gets logged: upstream
/// closing is what ends the loop, so nothing already queued is lost.
pub(crate) async fn run_stage<S: Stage>(
    stage: S,
    mut inbound: mpsc::Receiver<Bytes>,
    outbound: mpsc::Sender<Bytes>,
    stats: Arc<StageStats>,
    shutdown: Shutdown,
    poll_interval: Duration,
) {
    info!("Stage '{}' started", stage.name());
    let mut draining = false;

    loop {
        if !draining && shutdown.is_triggered() {
            info!("Shutdown requested, draining inbound queue");
            draining = true;
        }

        let bytes = match poll(&mut inbound, poll_interval).await {
            Poll::Message(bytes) => bytes,
            Poll::Idle => continue,
            Poll::Closed => break,
        };
        stats.record_received();

        let Some(envelope) = decode(&bytes, &stats) else {
            continue;
        };

        let envelope = match stage.process(envelope) {
            Outcome::Rewritten(envelope) => {
                stats.record_rewritten();
                envelope
            }
            Outcome::PassedThrough(envelope) => {
                stats.record_passed_through();
                envelope
            }
            Outcome::Failed(envelope) => {
                stats.record_failed();
                envelope
            }
        };

        if !forward(&outbound, &envelope, &stats).await {
            break;
        }
    }

    info!("Stage '{}' stopped ({})", stage.name(), stats.snapshot());
}

/// Worker loop feeding the first queue from the subscriber
///
/// The only loop that stops on the shutdown flag itself; dropping its
/// sender then closes every queue downstream in turn.
pub(crate) async fn run_source(
    mut subscriber: Box<dyn Subscriber>,
    outbound: mpsc::Sender<Bytes>,
    stats: Arc<StageStats>,
    shutdown: Shutdown,
    poll_interval: Duration,
) {
    info!("Subscriber '{}' started", subscriber.name());

    loop {
        if shutdown.is_triggered() {
            info!("Shutdown requested, no longer accepting messages");
            break;
        }

        let envelope = match timeout(poll_interval, subscriber.recv()).await {
            Err(_) => continue,
            Ok(Ok(Some(envelope))) => envelope,
            Ok(Ok(None)) | Ok(Err(RemoteError::Closed)) => {
                info!("Subscriber '{}' exhausted", subscriber.name());
                break;
            }
            Ok(Err(e)) => {
                warn!("Subscriber '{}' error: {}", subscriber.name(), e);
                tokio::time::sleep(poll_interval).await;
                continue;
            }
        };
        stats.record_received();
        debug!("Received message on '{}'", envelope.topic);

        stats.record_passed_through();
        if !forward(&outbound, &envelope, &stats).await {
            break;
        }
    }

    if let Err(e) = subscriber.close().await {
        warn!("Failed to close subscriber '{}': {}", subscriber.name(), e);
    }
    info!("Subscriber '{}' stopped ({})", subscriber.name(), stats.snapshot());
}

/// Worker loop draining the last queue into the publisher
///
/// Publish failures are logged and counted as drops; retries belong to
/// the publisher.
pub(crate) async fn run_sink(
    mut publisher: Box<dyn Publisher>,
    mut inbound: mpsc::Receiver<Bytes>,
    stats: Arc<StageStats>,
    shutdown: Shutdown,
    poll_interval: Duration,
) {
    info!("Publisher '{}' started", publisher.name());
    let mut draining = false;

    loop {
        if !draining && shutdown.is_triggered() {
            info!("Shutdown requested, draining inbound queue");
            draining = true;
        }

        let bytes = match poll(&mut inbound, poll_interval).await {
            Poll::Message(bytes) => bytes,
            Poll::Idle => continue,
            Poll::Closed => break,
        };
        stats.record_received();

        let Some(envelope) = decode(&bytes, &stats) else {
            continue;
        };

        match publisher.publish(&envelope).await {
            Ok(()) => {
                debug!("Published message on '{}'", envelope.topic);
                stats.record_passed_through();
            }
            Err(e) => {
                error!(
                    "Publisher '{}' failed on '{}': {}",
                    publisher.name(),
                    envelope.topic,
                    e
                );
                stats.record_dropped();
            }
        }
    }

    if let Err(e) = publisher.close().await {
        warn!("Failed to close publisher '{}': {}", publisher.name(), e);
    }
    info!("Publisher '{}' stopped ({})", publisher.name(), stats.snapshot());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Upper-cases every topic
    struct Shout;

    impl Stage for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn process(&self, envelope: Envelope) -> Outcome {
            Outcome::Rewritten(Envelope {
                topic: envelope.topic.to_uppercase(),
                payload: envelope.payload,
            })
        }
    }

    #[tokio::test]
    async fn test_stage_drops_undecodable_messages() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let stats = Arc::new(StageStats::new("shout"));

        let worker = tokio::spawn(run_stage(
            Shout,
            in_rx,
            out_tx,
            Arc::clone(&stats),
            Shutdown::new(),
            Duration::from_millis(5),
        ));

        in_tx.send(Bytes::from_static(b"not json")).await.unwrap();
        in_tx
            .send(Bytes::from_static(b"{\"topic\": \"a\"}"))
            .await
            .unwrap();
        in_tx
            .send(Envelope::new("a/b", json!({"x": 1})).encode().unwrap())
            .await
            .unwrap();
        drop(in_tx);

        worker.await.unwrap();

        let forwarded = Envelope::decode(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(forwarded, Envelope::new("A/B", json!({"x": 1})));
        assert_eq!(out_rx.recv().await, None);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.received, 3);
        assert_eq!(snapshot.dropped, 2);
        assert_eq!(snapshot.rewritten, 1);
    }

    #[tokio::test]
    async fn test_stage_keeps_running_after_shutdown_until_drained() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let worker = tokio::spawn(run_stage(
            Shout,
            in_rx,
            out_tx,
            Arc::new(StageStats::new("shout")),
            shutdown,
            Duration::from_millis(5),
        ));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!worker.is_finished());

        in_tx
            .send(Envelope::new("x", json!(null)).encode().unwrap())
            .await
            .unwrap();
        drop(in_tx);
        worker.await.unwrap();

        let forwarded = Envelope::decode(&out_rx.recv().await.unwrap()).unwrap();
        assert_eq!(forwarded.topic, "X");
    }

    #[tokio::test]
    async fn test_stage_stops_when_downstream_is_gone() {
        let (in_tx, in_rx) = mpsc::channel(8);
        let (out_tx, out_rx) = mpsc::channel(8);
        drop(out_rx);

        let worker = tokio::spawn(run_stage(
            Shout,
            in_rx,
            out_tx,
            Arc::new(StageStats::new("shout")),
            Shutdown::new(),
            Duration::from_millis(5),
        ));

        in_tx
            .send(Envelope::new("x", json!(1)).encode().unwrap())
            .await
            .unwrap();
        worker.await.unwrap();
        assert!(in_tx.is_closed());
    }
}
