//! Metadata collaborator interface.
//!
//! The pipeline treats the remote metadata API as an opaque source of a title
//! and two lists of stream locations. Concrete providers live outside this
//! crate.

use async_trait::async_trait;
use thiserror::Error;

/// Location of one remote elementary stream.
///
/// Immutable once resolved. Consumed once by a segment fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSource {
    /// Absolute URL of the stream resource
    pub url: String,
    /// Size announced by the metadata API, when it announces one
    pub expected_size_bytes: Option<u64>,
}

impl StreamSource {
    /// Creates a source with no announced size.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            expected_size_bytes: None,
        }
    }

    /// Sets the announced size of the resource.
    pub fn with_expected_size(mut self, bytes: u64) -> Self {
        self.expected_size_bytes = Some(bytes);
        self
    }
}

/// Everything the pipeline needs to know about one remote video.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedStreams {
    /// Display title of the video
    pub title: String,
    /// Video stream candidates, best first
    pub video_sources: Vec<StreamSource>,
    /// Audio stream candidates, best first
    pub audio_sources: Vec<StreamSource>,
}

impl ResolvedStreams {
    /// First video and first audio source, if both kinds are present.
    pub fn primary_pair(&self) -> Option<(&StreamSource, &StreamSource)> {
        Some((self.video_sources.first()?, self.audio_sources.first()?))
    }
}

/// Errors reported by a metadata collaborator.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The remote lookup could not be performed.
    #[error("Lookup failed for '{identifier}': {reason}")]
    LookupFailed {
        /// Identifier being resolved
        identifier: String,
        /// Description of the failure
        reason: String,
    },

    /// The remote API answered but refused the request.
    #[error("API rejected '{identifier}' with code {code}: {message}")]
    Rejected {
        /// Identifier being resolved
        identifier: String,
        /// API status code
        code: i64,
        /// API message, possibly empty
        message: String,
    },

    /// The response could not be decoded.
    #[error("Malformed metadata for '{identifier}': {reason}")]
    Malformed {
        /// Identifier being resolved
        identifier: String,
        /// Decoder error message
        reason: String,
    },
}

/// Resolves an opaque identifier into a title and stream locations.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Looks up the title and the video and audio streams for `identifier`.
    ///
    /// Returning empty stream lists is allowed; the pipeline rejects them.
    ///
    /// # Errors
    /// - `MetadataError::LookupFailed` - Network or transport failure
    /// - `MetadataError::Rejected` - API returned an error status
    /// - `MetadataError::Malformed` - Response could not be decoded
    async fn resolve_title_and_streams(
        &self,
        identifier: &str,
    ) -> Result<ResolvedStreams, MetadataError>;
}
