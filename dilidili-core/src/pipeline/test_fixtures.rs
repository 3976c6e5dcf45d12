//! Shared doubles for pipeline tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::PresentationSink;
use crate::fetch::{FetchError, FetchJob, FetchedStream, ProgressFn, SegmentFetcher};
use crate::metadata::{MetadataError, MetadataProvider, ResolvedStreams, StreamSource};
use crate::remux::boxes::CANONICAL_FTYP_BOX;

#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Status(String),
    Video(f64),
    Audio(f64),
    Overall(f64),
    Complete(PathBuf, String),
}

/// Sink that records every call in arrival order.
#[derive(Debug, Default)]
pub struct RecordingSink {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingSink {
    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn overall(&self) -> Vec<f64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Overall(f) => Some(f),
                _ => None,
            })
            .collect()
    }

    pub fn completions(&self) -> Vec<(PathBuf, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Complete(path, title) => Some((path, title)),
                _ => None,
            })
            .collect()
    }
}

impl PresentationSink for RecordingSink {
    fn set_status(&self, text: &str) {
        self.calls.lock().push(SinkCall::Status(text.to_string()));
    }

    fn set_video_progress(&self, fraction: f64) {
        self.calls.lock().push(SinkCall::Video(fraction));
    }

    fn set_audio_progress(&self, fraction: f64) {
        self.calls.lock().push(SinkCall::Audio(fraction));
    }

    fn set_overall_progress(&self, fraction: f64) {
        self.calls.lock().push(SinkCall::Overall(fraction));
    }

    fn on_complete(&self, output_path: &Path, title: &str) {
        self.calls
            .lock()
            .push(SinkCall::Complete(output_path.to_path_buf(), title.to_string()));
    }
}

/// Metadata provider answering from a fixed table.
#[derive(Debug, Default)]
pub struct StaticMetadata {
    entries: HashMap<String, ResolvedStreams>,
}

impl StaticMetadata {
    pub fn with_entry(mut self, identifier: &str, streams: ResolvedStreams) -> Self {
        self.entries.insert(identifier.to_string(), streams);
        self
    }
}

#[async_trait]
impl MetadataProvider for StaticMetadata {
    async fn resolve_title_and_streams(
        &self,
        identifier: &str,
    ) -> Result<ResolvedStreams, MetadataError> {
        self.entries
            .get(identifier)
            .cloned()
            .ok_or_else(|| MetadataError::Rejected {
                identifier: identifier.to_string(),
                code: -404,
                message: "video not found".to_string(),
            })
    }
}

/// Fetcher serving bodies from memory and counting invocations.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl MemoryFetcher {
    pub fn with_body(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SegmentFetcher for MemoryFetcher {
    async fn fetch(
        &self,
        source: &StreamSource,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<FetchedStream, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let body = self
            .bodies
            .get(&source.url)
            .ok_or_else(|| FetchError::NetworkFailure {
                url: source.url.clone(),
                reason: "HTTP status 404 Not Found".to_string(),
            })?;

        let mut job =
            FetchJob::new(source, destination).with_fallback_size(Some(body.len() as u64));
        for piece in body.chunks(1024) {
            if let Some(fraction) = job.record_written(piece.len()) {
                on_progress(fraction);
            }
        }
        std::fs::write(destination, body).map_err(|e| FetchError::StorageFailure {
            path: destination.to_path_buf(),
            source: e,
        })?;
        on_progress(job.finish());
        Ok(job.into_fetched())
    }
}

/// Fragment of `len` bytes beginning with the canonical ftyp box.
pub fn fragment(len: usize, fill: u8) -> Vec<u8> {
    let mut data = CANONICAL_FTYP_BOX.to_vec();
    data.resize(len.max(CANONICAL_FTYP_BOX.len()), fill);
    data
}

pub fn streams(title: &str, video: &[&str], audio: &[&str]) -> ResolvedStreams {
    ResolvedStreams {
        title: title.to_string(),
        video_sources: video.iter().map(|url| StreamSource::new(*url)).collect(),
        audio_sources: audio.iter().map(|url| StreamSource::new(*url)).collect(),
    }
}
