//! Pipeline facade: resolve, fetch both streams, mux.
//!
//! One `run` call drives a single identifier from metadata lookup to a merged
//! container and reports every step to a [`PresentationSink`]. The sink always
//! receives a terminal status, on success and on the first fatal failure.

pub mod events;
pub mod registry;

#[cfg(test)]
pub(crate) mod test_fixtures;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

pub use events::{EventChannel, EventSender, PipelineEvent, PresentationSink};
pub use registry::{InFlightGuard, InFlightRegistry};

use crate::config::{DilidiliConfig, StorageConfig};
use crate::coordinator::{DualStreamCoordinator, PairOutcome, StreamKind};
use crate::fetch::{HttpSegmentFetcher, SegmentFetcher};
use crate::metadata::{MetadataProvider, StreamSource};
use crate::remux::{self, MuxError, MuxResult, MuxStrategy};

/// Overall progress reported the instant muxing begins.
///
/// A fixed pin rather than a weighted average; mux duration is not measured.
pub const MUX_START_OVERALL_PROGRESS: f64 = 0.8;

/// Errors that end a pipeline invocation, named by the stage that failed.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Lookup failed or returned no usable pair of streams.
    #[error("Metadata stage failed for '{identifier}': {reason}")]
    MetadataFailure {
        /// Identifier being resolved
        identifier: String,
        /// Collaborator error or missing stream description
        reason: String,
    },

    /// At least one fragment file is missing or empty after fetching.
    #[error("Fetch stage incomplete: {reason}")]
    IncompleteInputs {
        /// Which stream(s) are unusable and why
        reason: String,
    },

    /// The per-invocation scratch directory could not be created.
    #[error("Fetch stage could not create scratch directory {}: {source}", .path.display())]
    ScratchDir {
        /// Scratch directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Container remux failed.
    #[error("Mux stage failed: {0}")]
    Mux(#[from] MuxError),

    /// Another invocation for the same identifier is still running.
    #[error("A download for '{identifier}' is already in progress")]
    AlreadyInFlight {
        /// Identifier already claimed
        identifier: String,
    },

    /// Identifier cannot be used as a scratch directory name.
    #[error("Invalid identifier '{identifier}'")]
    InvalidIdentifier {
        /// Rejected identifier
        identifier: String,
    },

    /// Pipeline components could not be built from configuration.
    #[error("Pipeline setup failed: {reason}")]
    Setup {
        /// Description of the failure
        reason: String,
    },
}

/// Paths and sources owned by one live invocation.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub identifier: String,
    pub title: String,
    pub video_source: StreamSource,
    pub audio_source: StreamSource,
    pub scratch_dir: PathBuf,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub output_path: PathBuf,
}

/// Successful invocation result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// Display title from metadata
    pub title: String,
    /// Merged container
    pub mux: MuxResult,
    /// Scratch directory holding the fragments and merged file
    pub scratch_dir: PathBuf,
    /// Downloaded video fragment
    pub video_path: PathBuf,
    /// Downloaded audio fragment
    pub audio_path: PathBuf,
}

/// Orchestrates coordinator and remuxer for one identifier at a time each.
///
/// Shareable across tasks; invocations for different identifiers run fully in
/// parallel. Every invocation gets a fresh scratch subdirectory that belongs to
/// the caller once `run` returns.
pub struct Pipeline {
    config: DilidiliConfig,
    coordinator: DualStreamCoordinator,
    strategy: Arc<dyn MuxStrategy>,
    in_flight: InFlightRegistry,
}

impl Pipeline {
    /// Builds a pipeline from explicit components.
    pub fn new(
        config: DilidiliConfig,
        fetcher: Arc<dyn SegmentFetcher>,
        strategy: Arc<dyn MuxStrategy>,
    ) -> Self {
        let coordinator = DualStreamCoordinator::new(fetcher, config.storage.clone());
        Self {
            config,
            coordinator,
            strategy,
            in_flight: InFlightRegistry::new(),
        }
    }

    /// Builds the HTTP fetcher and configured mux strategy.
    ///
    /// # Errors
    /// - `PipelineError::Setup` - HTTP client rejected the network settings
    pub fn from_config(config: DilidiliConfig) -> Result<Self, PipelineError> {
        let fetcher = HttpSegmentFetcher::new(&config.network).map_err(|e| {
            PipelineError::Setup {
                reason: e.to_string(),
            }
        })?;
        let strategy = remux::build_strategy(&config.mux);
        Ok(Self::new(config, Arc::new(fetcher), strategy))
    }

    pub fn in_flight(&self) -> &InFlightRegistry {
        &self.in_flight
    }

    /// Runs the whole pipeline for `identifier`.
    ///
    /// On success the sink's `on_complete` receives the merged file and title
    /// after the final "Ready" status. On failure the error text is the final
    /// status.
    ///
    /// # Errors
    /// - `PipelineError::InvalidIdentifier` - Empty or path-like identifier
    /// - `PipelineError::AlreadyInFlight` - Same identifier already running
    /// - `PipelineError::MetadataFailure` - Lookup failed or no stream pair
    /// - `PipelineError::ScratchDir` - Scratch directory not creatable
    /// - `PipelineError::IncompleteInputs` - A fragment is missing or empty
    /// - `PipelineError::Mux` - Remux failed
    pub async fn run(
        &self,
        identifier: &str,
        metadata: &dyn MetadataProvider,
        sink: Arc<dyn PresentationSink>,
    ) -> Result<PipelineOutput, PipelineError> {
        let channel = EventChannel::spawn(Arc::clone(&sink));
        let events = channel.sender();

        let result = self.run_stages(identifier, metadata, &events).await;

        match &result {
            Ok(output) => {
                tracing::info!(
                    "Pipeline for {} complete: {}",
                    identifier,
                    output.mux.output_path.display()
                );
                events.status(format!("Ready: {}", output.mux.output_path.display()));
                channel.flush().await;
                sink.on_complete(&output.mux.output_path, &output.title);
            }
            Err(e) => {
                tracing::error!("Pipeline for {} failed: {}", identifier, e);
                events.status(format!("Error: {e}"));
                channel.flush().await;
            }
        }

        result
    }

    async fn run_stages(
        &self,
        identifier: &str,
        metadata: &dyn MetadataProvider,
        events: &EventSender,
    ) -> Result<PipelineOutput, PipelineError> {
        validate_identifier(identifier)?;
        let _guard = self.in_flight.try_acquire(identifier).ok_or_else(|| {
            PipelineError::AlreadyInFlight {
                identifier: identifier.to_string(),
            }
        })?;

        events.status(format!("Resolving {identifier}..."));
        let request = self.resolve(identifier, metadata).await?;
        events.status(format!("Resolved: {}", request.title));

        events.video_progress(0.0);
        events.audio_progress(0.0);
        events.overall_progress(0.0);
        events.status("Fetching video and audio streams...");

        let outcome = {
            let callbacks = events.pair_callbacks();
            self.coordinator
                .run_pair(
                    &request.video_source,
                    &request.audio_source,
                    &request.scratch_dir,
                    &request.identifier,
                    &callbacks,
                )
                .await?
        };
        verify_inputs(&outcome, &request).await?;

        events.status("Muxing video and audio...");
        events.overall_progress(MUX_START_OVERALL_PROGRESS);

        let mux_result = match remux::mux(
            &request.video_path,
            &request.audio_path,
            &request.output_path,
            self.strategy.as_ref(),
        )
        .await
        {
            Ok(mux_result) => mux_result,
            Err(e) => {
                discard_partial_output(&request.output_path).await;
                return Err(e.into());
            }
        };
        events.overall_progress(1.0);

        Ok(PipelineOutput {
            title: request.title,
            mux: mux_result,
            scratch_dir: request.scratch_dir,
            video_path: request.video_path,
            audio_path: request.audio_path,
        })
    }

    /// Looks up `identifier` and lays out its scratch paths.
    async fn resolve(
        &self,
        identifier: &str,
        metadata: &dyn MetadataProvider,
    ) -> Result<PipelineRequest, PipelineError> {
        let resolved = metadata
            .resolve_title_and_streams(identifier)
            .await
            .map_err(|e| PipelineError::MetadataFailure {
                identifier: identifier.to_string(),
                reason: e.to_string(),
            })?;

        let (video_source, audio_source) =
            resolved
                .primary_pair()
                .ok_or_else(|| PipelineError::MetadataFailure {
                    identifier: identifier.to_string(),
                    reason: format!(
                        "no usable stream pair ({} video, {} audio)",
                        resolved.video_sources.len(),
                        resolved.audio_sources.len()
                    ),
                })?;

        let storage = &self.config.storage;
        let scratch_dir = create_scratch_dir(storage, identifier).await?;
        let video_path = self
            .coordinator
            .destination_for(&scratch_dir, identifier, StreamKind::Video);
        let audio_path = self
            .coordinator
            .destination_for(&scratch_dir, identifier, StreamKind::Audio);
        let output_path =
            scratch_dir.join(format!("{identifier}_merged.{}", storage.output_extension));

        Ok(PipelineRequest {
            identifier: identifier.to_string(),
            title: resolved.title.clone(),
            video_source: video_source.clone(),
            audio_source: audio_source.clone(),
            scratch_dir,
            video_path,
            audio_path,
            output_path,
        })
    }
}

/// Rejects identifiers that would escape or collapse the scratch root.
fn validate_identifier(identifier: &str) -> Result<(), PipelineError> {
    let invalid = identifier.trim().is_empty()
        || identifier == "."
        || identifier == ".."
        || identifier.contains(['/', '\\'])
        || identifier.chars().any(char::is_control);
    if invalid {
        return Err(PipelineError::InvalidIdentifier {
            identifier: identifier.to_string(),
        });
    }
    Ok(())
}

async fn create_scratch_dir(
    storage: &StorageConfig,
    identifier: &str,
) -> Result<PathBuf, PipelineError> {
    let scratch_failure = |source: std::io::Error| PipelineError::ScratchDir {
        path: storage.scratch_root.join(format!("{identifier}-*")),
        source,
    };

    let owned_storage = storage.clone();
    let owned_identifier = identifier.to_string();
    let scratch_dir =
        tokio::task::spawn_blocking(move || owned_storage.create_scratch_dir(&owned_identifier))
            .await
            .map_err(|e| scratch_failure(std::io::Error::other(e)))?
            .map_err(scratch_failure)?;

    tracing::debug!("Scratch directory for {}: {}", identifier, scratch_dir.display());
    Ok(scratch_dir)
}

/// Both branches must have succeeded and left a non-empty file behind.
async fn verify_inputs(
    outcome: &PairOutcome,
    request: &PipelineRequest,
) -> Result<(), PipelineError> {
    let failures = outcome.failures();
    if !failures.is_empty() {
        let reason = failures
            .iter()
            .map(|(kind, e)| format!("{kind} stream failed: {e}"))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(PipelineError::IncompleteInputs { reason });
    }

    for (kind, path) in [
        (StreamKind::Video, &request.video_path),
        (StreamKind::Audio, &request.audio_path),
    ] {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() > 0 => {}
            Ok(_) => {
                return Err(PipelineError::IncompleteInputs {
                    reason: format!("{kind} fragment {} is empty", path.display()),
                });
            }
            Err(e) => {
                return Err(PipelineError::IncompleteInputs {
                    reason: format!("{kind} fragment {} is missing: {e}", path.display()),
                });
            }
        }
    }
    Ok(())
}

async fn discard_partial_output(output_path: &Path) {
    match tokio::fs::remove_file(output_path).await {
        Ok(()) => tracing::debug!("Removed partial output {}", output_path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Failed to remove partial output {}: {}",
            output_path.display(),
            e
        ),
    }
}
