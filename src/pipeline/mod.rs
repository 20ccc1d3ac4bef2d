//! Pipeline Composition
//!
//! Wires the four stages of the relay through three bounded queues:
//!
//! ```text
//! Subscriber -> [q1] -> topic_rewriter -> [q2] -> json_message_rewriter -> [q3] -> Publisher
//! ```
//!
//! Each stage runs as its own task and owns its rule table outright; the
//! queues carry encoded envelopes and are the only thing stages share.
//! A slow stage lets its inbound queue fill and then applies backpressure
//! through the bounded send; nothing else flows upstream.
//!
//! Shutdown is cooperative. The subscriber task stops taking input, and each
//! later stage exits once its inbound queue is closed and drained, so every
//! message already accepted reaches the publisher.

mod stage;
mod stats;

pub use stage::{Outcome, Stage};
pub use stats::{StageStats, StageStatsSnapshot};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use crate::config::{Config, ConfigError, PipelineConfig};
use crate::remote::{Publisher, Subscriber};
use crate::rewrite::TopicRewriter;
use crate::transform::MessageRewriter;

/// Cooperative shutdown flag shared by every stage
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Entry point for assembling a pipeline
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline between a subscriber and a publisher
    ///
    /// Without rule tables both rewrite stages pass every message through.
    pub fn builder(
        subscriber: Box<dyn Subscriber>,
        publisher: Box<dyn Publisher>,
    ) -> PipelineBuilder {
        PipelineBuilder {
            subscriber,
            publisher,
            topic_rewriter: TopicRewriter::default(),
            message_rewriter: MessageRewriter::default(),
            config: PipelineConfig::default(),
        }
    }
}

/// Pipeline under construction
pub struct PipelineBuilder {
    subscriber: Box<dyn Subscriber>,
    publisher: Box<dyn Publisher>,
    topic_rewriter: TopicRewriter,
    message_rewriter: MessageRewriter,
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn topic_rewriter(mut self, topic_rewriter: TopicRewriter) -> Self {
        self.topic_rewriter = topic_rewriter;
        self
    }

    pub fn message_rewriter(mut self, message_rewriter: MessageRewriter) -> Self {
        self.message_rewriter = message_rewriter;
        self
    }

    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Compile both rule tables and take the pipeline settings from `config`
    pub fn with_config(self, config: &Config) -> Result<Self, ConfigError> {
        let topic_rewriter = TopicRewriter::new(&config.topic_rewriter)?;
        let message_rewriter = MessageRewriter::new(&config.json_message_rewriter)?;
        Ok(self
            .topic_rewriter(topic_rewriter)
            .message_rewriter(message_rewriter)
            .config(config.pipeline.clone()))
    }

    /// Create the queues and spawn one task per stage
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(self) -> PipelineHandle {
        let PipelineBuilder {
            subscriber,
            publisher,
            topic_rewriter,
            message_rewriter,
            config,
        } = self;

        let capacity = config.queue_capacity.max(1);
        let poll_interval = config.poll_interval;
        let shutdown = Shutdown::new();

        let (q1_tx, q1_rx) = mpsc::channel(capacity);
        let (q2_tx, q2_rx) = mpsc::channel(capacity);
        let (q3_tx, q3_rx) = mpsc::channel(capacity);

        let source_stats = Arc::new(StageStats::new("subscriber"));
        let topic_stats = Arc::new(StageStats::new(topic_rewriter.name()));
        let message_stats = Arc::new(StageStats::new(message_rewriter.name()));
        let sink_stats = Arc::new(StageStats::new("publisher"));

        info!(
            "Starting pipeline: {} topic mapping(s), {} transform rule(s), queue capacity {}, poll interval {:?}",
            topic_rewriter.mapping_count(),
            message_rewriter.rule_count(),
            capacity,
            poll_interval
        );

        let tasks = vec![
            tokio::spawn(
                stage::run_source(
                    subscriber,
                    q1_tx,
                    Arc::clone(&source_stats),
                    shutdown.clone(),
                    poll_interval,
                )
                .instrument(info_span!("stage", name = "subscriber")),
            ),
            tokio::spawn(
                stage::run_stage(
                    topic_rewriter,
                    q1_rx,
                    q2_tx,
                    Arc::clone(&topic_stats),
                    shutdown.clone(),
                    poll_interval,
                )
                .instrument(info_span!("stage", name = topic_stats.name)),
            ),
            tokio::spawn(
                stage::run_stage(
                    message_rewriter,
                    q2_rx,
                    q3_tx,
                    Arc::clone(&message_stats),
                    shutdown.clone(),
                    poll_interval,
                )
                .instrument(info_span!("stage", name = message_stats.name)),
            ),
            tokio::spawn(
                stage::run_sink(
                    publisher,
                    q3_rx,
                    Arc::clone(&sink_stats),
                    shutdown.clone(),
                    poll_interval,
                )
                .instrument(info_span!("stage", name = "publisher")),
            ),
        ];

        PipelineHandle {
            shutdown,
            stats: vec![source_stats, topic_stats, message_stats, sink_stats],
            tasks,
        }
    }
}

/// Handle to a running pipeline
pub struct PipelineHandle {
    shutdown: Shutdown,
    stats: Vec<Arc<StageStats>>,
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Request a cooperative shutdown
    pub fn shutdown(&self) {
        info!("Pipeline shutdown requested");
        self.shutdown.trigger();
    }

    /// Shutdown flag, for wiring to signal handlers
    pub fn shutdown_signal(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Current counters, in stage order
    pub fn stats(&self) -> Vec<StageStatsSnapshot> {
        self.stats.iter().map(|s| s.snapshot()).collect()
    }

    /// Whether every stage task has exited
    pub fn is_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.is_finished())
    }

    /// Wait for every stage to exit and return the final counters
    pub async fn join(self) -> Vec<StageStatsSnapshot> {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Pipeline stage task failed: {}", e);
            }
        }
        info!("Pipeline stopped");
        self.stats.iter().map(|s| s.snapshot()).collect()
    }
}
