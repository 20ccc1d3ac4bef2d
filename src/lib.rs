//! RelayMQ - rule-driven relay between a local message bus and a remote endpoint
//!
//! Messages flow one way through a fixed pipeline:
//!
//! ```text
//! Subscriber -> topic rewrite -> payload transform -> Publisher
//! ```
//!
//! Both rewrite stages select their rule through a wildcard topic trie
//! (literal > `+` > `#`, with per-level backtracking). The topic stage maps
//! local topic prefixes onto the remote namespace; the payload stage
//! reshapes JSON payloads with declarative specs over flattened paths.

pub mod config;
pub mod envelope;
pub mod pipeline;
pub mod remote;
pub mod rewrite;
pub mod topic;
pub mod transform;

pub use config::Config;
pub use envelope::{Envelope, EnvelopeError};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineHandle, StageStatsSnapshot};
pub use remote::{Publisher, RemoteError, Subscriber};
pub use rewrite::TopicRewriter;
pub use topic::TopicTrie;
pub use transform::{transform_message, MessageRewriter, TransformError, TransformSpec};
