//! RelayMQ - topic and payload rewriting relay
//!
//! Reads `{"topic": ..., "payload": ...}` envelopes one per line on stdin,
//! rewrites them through the configured topic mappings and payload
//! transforms, and writes them one per line on stdout. Logs go to stderr.
//!
//! Usage:
//!   relaymq [OPTIONS]
//!
//! Options:
//!   -c, --config <FILE>          Configuration file path
//!   -l, --log-level <LEVEL>      Log level (error, warn, info, debug, trace)
//!   --poll-interval <DURATION>   Stage poll interval (e.g. 50ms)
//!   --queue-capacity <N>         Capacity of each inter-stage queue
//!   --check                      Validate the configuration and exit
//!   -h, --help                   Print help

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use relaymq::config::Config;
use relaymq::pipeline::Pipeline;
use relaymq::remote::{JsonLinesPublisher, JsonLinesSubscriber};
use relaymq::rewrite::TopicRewriter;
use relaymq::transform::MessageRewriter;

/// Log level for CLI
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Informational messages
    #[default]
    Info,
    /// Debug messages
    Debug,
    /// Trace messages (very verbose)
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// RelayMQ - topic and payload rewriting relay
#[derive(Parser, Debug)]
#[command(name = "relaymq")]
#[command(author = "RelayMQ Contributors")]
#[command(version)]
#[command(about = "Rewrites topics and JSON payloads of bus messages on their way to a remote endpoint")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, value_enum)]
    log_level: Option<LogLevel>,

    /// Bounded wait of each stage's inbound poll (e.g. 50ms)
    #[arg(long, value_parser = humantime_serde::re::humantime::parse_duration)]
    poll_interval: Option<Duration>,

    /// Capacity of each inter-stage queue
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Validate the configuration, print the rule summary and exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration file if specified, otherwise use defaults
    let mut config = if let Some(config_path) = &args.config {
        match Config::load(config_path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error loading config file: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Setup logging - CLI overrides config, config overrides default (info)
    let log_level = args.log_level.unwrap_or_else(|| {
        match config.log.level.to_lowercase().as_str() {
            "error" => LogLevel::Error,
            "warn" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info,
        }
    });

    // stdout carries envelopes, so logs go to stderr
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level.to_tracing_level())
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    if let Some(path) = &args.config {
        info!("Loaded configuration from {:?}", path);
    }

    // CLI args override file config
    if let Some(poll_interval) = args.poll_interval {
        config.pipeline.poll_interval = poll_interval;
    }
    if let Some(queue_capacity) = args.queue_capacity {
        config.pipeline.queue_capacity = queue_capacity;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let topic_rewriter = TopicRewriter::new(&config.topic_rewriter)?;
    let message_rewriter = MessageRewriter::new(&config.json_message_rewriter)?;

    info!("  Topic mappings: {}", topic_rewriter.mapping_count());
    info!("  Transform rules: {}", message_rewriter.rule_count());
    info!("  Poll interval: {:?}", config.pipeline.poll_interval);
    info!("  Queue capacity: {}", config.pipeline.queue_capacity);

    if args.check {
        println!(
            "configuration ok: {} topic mapping(s), {} transform rule(s)",
            topic_rewriter.mapping_count(),
            message_rewriter.rule_count()
        );
        return Ok(());
    }

    info!("Starting RelayMQ");

    let handle = Pipeline::builder(
        Box::new(JsonLinesSubscriber::stdin()),
        Box::new(JsonLinesPublisher::stdout()),
    )
    .topic_rewriter(topic_rewriter)
    .message_rewriter(message_rewriter)
    .config(config.pipeline.clone())
    .spawn();

    let shutdown = handle.shutdown_signal();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, shutting down");
                shutdown.trigger();
            }
            Err(e) => error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    for stats in handle.join().await {
        info!("  {}", stats);
    }

    // a stdin read may still be parked in the blocking pool, which would
    // hold up runtime teardown
    std::process::exit(0);
}
