//! Dual-stream coordination: fetching video and audio concurrently.
//!
//! The coordinator spawns one worker task per stream kind and waits for both
//! to finish. A failing worker never cancels its sibling; each branch comes
//! back as its own `Result` and the caller decides what an incomplete pair
//! means.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::StorageConfig;
use crate::fetch::{FetchError, FetchedStream, SegmentFetcher};
use crate::metadata::StreamSource;
use crate::pipeline::PipelineError;

/// Progress callback shared with a worker task.
pub type SharedProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Status text callback shared with both worker tasks.
///
/// Implementations must tolerate concurrent calls from both workers.
pub type SharedStatusFn = Arc<dyn Fn(String) + Send + Sync>;

/// Which elementary stream a worker handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Video,
    Audio,
}

impl StreamKind {
    /// File name suffix used for the downloaded fragment.
    pub fn file_tag(self) -> &'static str {
        match self {
            StreamKind::Video => "video",
            StreamKind::Audio => "audio",
        }
    }
}

impl std::fmt::Display for StreamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.file_tag())
    }
}

/// Result of one worker branch.
pub type StreamOutcome = Result<FetchedStream, FetchError>;

/// Joined results of both worker branches.
#[derive(Debug)]
pub struct PairOutcome {
    pub video: StreamOutcome,
    pub audio: StreamOutcome,
}

impl PairOutcome {
    /// Branches that failed, video first.
    pub fn failures(&self) -> Vec<(StreamKind, &FetchError)> {
        [
            (StreamKind::Video, &self.video),
            (StreamKind::Audio, &self.audio),
        ]
        .into_iter()
        .filter_map(|(kind, outcome)| outcome.as_ref().err().map(|e| (kind, e)))
        .collect()
    }

    /// Both fetched streams, when both branches succeeded.
    pub fn both(&self) -> Option<(&FetchedStream, &FetchedStream)> {
        Some((self.video.as_ref().ok()?, self.audio.as_ref().ok()?))
    }
}

/// Callbacks the workers report through.
#[derive(Clone)]
pub struct PairCallbacks {
    pub on_status: SharedStatusFn,
    pub on_video_progress: SharedProgressFn,
    pub on_audio_progress: SharedProgressFn,
}

impl PairCallbacks {
    /// Callbacks that discard every report.
    pub fn silent() -> Self {
        Self {
            on_status: Arc::new(|_: String| {}),
            on_video_progress: Arc::new(|_: f64| {}),
            on_audio_progress: Arc::new(|_: f64| {}),
        }
    }
}

/// Runs the video and audio fetches of one invocation side by side.
pub struct DualStreamCoordinator {
    fetcher: Arc<dyn SegmentFetcher>,
    storage: StorageConfig,
}

impl DualStreamCoordinator {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, storage: StorageConfig) -> Self {
        Self { fetcher, storage }
    }

    /// Local path of the fragment file for `kind` inside `temp_dir`.
    ///
    /// Named `<file_stem>_<kind>.<ext>`.
    pub fn destination_for(&self, temp_dir: &Path, file_stem: &str, kind: StreamKind) -> PathBuf {
        let extension = match kind {
            StreamKind::Video => &self.storage.video_extension,
            StreamKind::Audio => &self.storage.audio_extension,
        };
        temp_dir.join(format!("{file_stem}_{}.{extension}", kind.file_tag()))
    }

    /// Fetches both streams concurrently into `temp_dir` and waits for both.
    ///
    /// Creates `temp_dir` if needed. Individual fetch failures are forwarded
    /// as status text and returned per branch; they do not fail the call.
    ///
    /// # Errors
    /// - `PipelineError::ScratchDir` - `temp_dir` could not be created
    pub async fn run_pair(
        &self,
        video: &StreamSource,
        audio: &StreamSource,
        temp_dir: &Path,
        file_stem: &str,
        callbacks: &PairCallbacks,
    ) -> Result<PairOutcome, PipelineError> {
        tokio::fs::create_dir_all(temp_dir)
            .await
            .map_err(|e| PipelineError::ScratchDir {
                path: temp_dir.to_path_buf(),
                source: e,
            })?;

        let video_handle = self.spawn_worker(
            StreamKind::Video,
            video.clone(),
            self.destination_for(temp_dir, file_stem, StreamKind::Video),
            Arc::clone(&callbacks.on_status),
            Arc::clone(&callbacks.on_video_progress),
        );
        let audio_handle = self.spawn_worker(
            StreamKind::Audio,
            audio.clone(),
            self.destination_for(temp_dir, file_stem, StreamKind::Audio),
            Arc::clone(&callbacks.on_status),
            Arc::clone(&callbacks.on_audio_progress),
        );

        // Barrier, not a race: both branches always run to completion.
        let (video_joined, audio_joined) = tokio::join!(video_handle, audio_handle);
        let outcome = PairOutcome {
            video: flatten_join(StreamKind::Video, video_joined),
            audio: flatten_join(StreamKind::Audio, audio_joined),
        };

        tracing::debug!(
            "Fetch pair joined: video_ok={}, audio_ok={}",
            outcome.video.is_ok(),
            outcome.audio.is_ok()
        );
        Ok(outcome)
    }

    fn spawn_worker(
        &self,
        kind: StreamKind,
        source: StreamSource,
        destination: PathBuf,
        on_status: SharedStatusFn,
        on_progress: SharedProgressFn,
    ) -> JoinHandle<StreamOutcome> {
        let fetcher = Arc::clone(&self.fetcher);
        tokio::spawn(async move {
            on_status(format!("Downloading {kind} stream..."));
            tracing::info!("Fetching {} stream from {}", kind, source.url);

            let result = fetcher
                .fetch(&source, &destination, on_progress.as_ref())
                .await;

            if let Err(e) = &result {
                tracing::warn!("{} stream fetch failed: {}", kind, e);
                on_status(format!("{kind} download failed: {e}"));
            }
            result
        })
    }
}

fn flatten_join(
    kind: StreamKind,
    joined: Result<StreamOutcome, tokio::task::JoinError>,
) -> StreamOutcome {
    joined.unwrap_or_else(|e| {
        tracing::error!("{} fetch worker aborted: {}", kind, e);
        Err(FetchError::Aborted {
            reason: e.to_string(),
        })
    })
}
