//! Segment fetching: streaming one remote resource to local storage.
//!
//! A fetch writes exactly one file and reports fractional progress after each
//! chunk. Completion is always reported as 1.0, even when the announced size
//! turned out to be wrong or was never known.

pub mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

pub use http::HttpSegmentFetcher;

use crate::metadata::StreamSource;

/// Progress callback receiving a fraction in `[0, 1]`.
pub type ProgressFn<'a> = &'a (dyn Fn(f64) + Send + Sync);

/// Errors that can occur while fetching one stream.
///
/// Either failure may leave a partial file at the destination; callers own
/// its cleanup.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, transport, or HTTP status failure.
    #[error("Network failure fetching {url}: {reason}")]
    NetworkFailure {
        /// URL being fetched
        url: String,
        /// Transport error description
        reason: String,
    },

    /// Local file could not be created or written.
    #[error("Storage failure writing {}: {source}", .path.display())]
    StorageFailure {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The worker running the fetch was aborted before finishing.
    #[error("Fetch worker aborted: {reason}")]
    Aborted {
        /// Join error description
        reason: String,
    },

    /// HTTP client could not be constructed from configuration.
    #[error("HTTP client setup failed: {reason}")]
    ClientSetup {
        /// Description of the invalid setting
        reason: String,
    },
}

/// Successfully fetched stream on local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedStream {
    /// File the stream was written to
    pub path: PathBuf,
    /// Total bytes written
    pub bytes_written: u64,
}

/// Streams a remote resource into a local file.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    /// Fetches `source` into a newly created file at `destination`.
    ///
    /// Overwrites any existing file. Does not create parent directories.
    ///
    /// # Errors
    /// - `FetchError::NetworkFailure` - Connection or transport error
    /// - `FetchError::StorageFailure` - Local create or write error
    async fn fetch(
        &self,
        source: &StreamSource,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<FetchedStream, FetchError>;
}

/// Byte accounting for one in-progress fetch.
///
/// Owned by a single write loop; progress is derived from bytes written and
/// never decreases.
#[derive(Debug, Clone)]
pub struct FetchJob {
    destination: PathBuf,
    expected_size: Option<u64>,
    bytes_written: u64,
    progress_fraction: f64,
}

impl FetchJob {
    /// Starts accounting for `source` written to `destination`.
    pub fn new(source: &StreamSource, destination: impl Into<PathBuf>) -> Self {
        let expected_size = source.expected_size_bytes.filter(|size| *size > 0);
        Self {
            destination: destination.into(),
            expected_size,
            bytes_written: 0,
            progress_fraction: 0.0,
        }
    }

    /// Uses `fallback` as the expected size when the source announced none.
    pub fn with_fallback_size(mut self, fallback: Option<u64>) -> Self {
        if self.expected_size.is_none() {
            self.expected_size = fallback.filter(|size| *size > 0);
        }
        self
    }

    /// Records `len` newly written bytes.
    ///
    /// Returns the new progress fraction when the expected size is known.
    pub fn record_written(&mut self, len: usize) -> Option<f64> {
        self.bytes_written += len as u64;
        let expected = self.expected_size?;
        let fraction = (self.bytes_written as f64 / expected as f64).min(1.0);
        self.progress_fraction = self.progress_fraction.max(fraction);
        Some(self.progress_fraction)
    }

    /// Marks the job complete and returns the final fraction, always 1.0.
    pub fn finish(&mut self) -> f64 {
        self.progress_fraction = 1.0;
        self.progress_fraction
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    pub fn progress_fraction(&self) -> f64 {
        self.progress_fraction
    }

    /// Converts the finished job into its outcome.
    pub fn into_fetched(self) -> FetchedStream {
        FetchedStream {
            path: self.destination,
            bytes_written: self.bytes_written,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_with_announced_size() {
        let source = StreamSource::new("http://cdn/v").with_expected_size(100);
        let mut job = FetchJob::new(&source, "/tmp/v.m4s");

        assert_eq!(job.record_written(25), Some(0.25));
        assert_eq!(job.record_written(25), Some(0.5));
        assert_eq!(job.bytes_written(), 50);
        assert_eq!(job.finish(), 1.0);
    }

    #[test]
    fn test_progress_unknown_size_reports_nothing_until_finish() {
        let mut job = FetchJob::new(&StreamSource::new("http://cdn/a"), "/tmp/a.m4s");

        assert_eq!(job.record_written(1024), None);
        assert_eq!(job.progress_fraction(), 0.0);
        assert_eq!(job.finish(), 1.0);
    }

    #[test]
    fn test_zero_announced_size_falls_back_to_content_length() {
        let source = StreamSource::new("http://cdn/v").with_expected_size(0);
        let mut job = FetchJob::new(&source, "/tmp/v.m4s").with_fallback_size(Some(10));

        assert_eq!(job.record_written(5), Some(0.5));
    }

    #[test]
    fn test_announced_size_wins_over_fallback() {
        let source = StreamSource::new("http://cdn/v").with_expected_size(200);
        let mut job = FetchJob::new(&source, "/tmp/v.m4s").with_fallback_size(Some(100));

        assert_eq!(job.record_written(100), Some(0.5));
    }

    #[test]
    fn test_oversized_body_is_clamped() {
        let source = StreamSource::new("http://cdn/v").with_expected_size(10);
        let mut job = FetchJob::new(&source, "/tmp/v.m4s");

        assert_eq!(job.record_written(8), Some(0.8));
        assert_eq!(job.record_written(8), Some(1.0));
        assert_eq!(job.record_written(8), Some(1.0));
        assert_eq!(job.into_fetched().bytes_written, 24);
    }
}
