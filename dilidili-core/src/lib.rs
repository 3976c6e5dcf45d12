//! Dilidili Core - Concurrent dual-stream fetch and remux pipeline
//!
//! This crate downloads the separate video and audio elementary streams of a
//! remote video in parallel, tracks their progress independently, and splices
//! the two fragmented MP4 files into one playable container. Metadata lookup
//! and presentation are collaborator traits implemented elsewhere.

pub mod config;
pub mod coordinator;
pub mod fetch;
pub mod metadata;
pub mod pipeline;
pub mod remux;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::DilidiliConfig;
pub use coordinator::{DualStreamCoordinator, PairOutcome, StreamKind};
pub use fetch::{FetchError, HttpSegmentFetcher, SegmentFetcher};
pub use metadata::{MetadataError, MetadataProvider, ResolvedStreams, StreamSource};
pub use pipeline::{
    MUX_START_OVERALL_PROGRESS, Pipeline, PipelineError, PipelineEvent, PipelineOutput,
    PresentationSink,
};
pub use remux::{MuxError, MuxResult, MuxStrategy, MuxStrategyKind};
