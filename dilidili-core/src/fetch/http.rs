//! HTTP segment fetcher backed by reqwest.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{FetchError, FetchJob, FetchedStream, ProgressFn, SegmentFetcher};
use crate::config::NetworkConfig;
use crate::metadata::StreamSource;

/// Production fetcher streaming over HTTP(S).
///
/// Every request carries the configured browser user agent and referer.
#[derive(Debug, Clone)]
pub struct HttpSegmentFetcher {
    client: reqwest::Client,
    chunk_size: usize,
}

impl HttpSegmentFetcher {
    /// Builds a fetcher from network configuration.
    ///
    /// # Errors
    /// - `FetchError::ClientSetup` - Referer is not a valid header value or
    ///   the TLS backend failed to initialise
    pub fn new(config: &NetworkConfig) -> Result<Self, FetchError> {
        let client = config.build_client().map_err(|e| FetchError::ClientSetup {
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            chunk_size: config.chunk_size.max(1),
        })
    }
}

#[async_trait]
impl SegmentFetcher for HttpSegmentFetcher {
    async fn fetch(
        &self,
        source: &StreamSource,
        destination: &Path,
        on_progress: ProgressFn<'_>,
    ) -> Result<FetchedStream, FetchError> {
        let network_failure = |e: reqwest::Error| FetchError::NetworkFailure {
            url: source.url.clone(),
            reason: e.to_string(),
        };
        let storage_failure = |e: std::io::Error| FetchError::StorageFailure {
            path: destination.to_path_buf(),
            source: e,
        };

        tracing::debug!("Requesting {}", source.url);
        let mut response = self
            .client
            .get(&source.url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(network_failure)?;

        let mut job =
            FetchJob::new(source, destination).with_fallback_size(response.content_length());

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(storage_failure)?;

        while let Some(chunk) = response.chunk().await.map_err(network_failure)? {
            for piece in chunk.chunks(self.chunk_size) {
                file.write_all(piece).await.map_err(storage_failure)?;
                if let Some(fraction) = job.record_written(piece.len()) {
                    on_progress(fraction);
                }
            }
        }
        file.flush().await.map_err(storage_failure)?;

        on_progress(job.finish());
        tracing::info!(
            "Fetched {} bytes from {} into {}",
            job.bytes_written(),
            source.url,
            destination.display()
        );

        Ok(job.into_fetched())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_referer_is_client_setup_error() {
        let config = NetworkConfig {
            referer: "bad\nreferer".to_string(),
            ..NetworkConfig::default()
        };

        let result = HttpSegmentFetcher::new(&config);
        assert!(matches!(result, Err(FetchError::ClientSetup { .. })));
    }

    #[test]
    fn test_zero_chunk_size_is_raised_to_one() {
        let config = NetworkConfig {
            chunk_size: 0,
            ..NetworkConfig::default()
        };

        let fetcher = HttpSegmentFetcher::new(&config).unwrap();
        assert_eq!(fetcher.chunk_size, 1);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_failure_and_creates_no_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let destination = temp_dir.path().join("video.m4s");
        let fetcher = HttpSegmentFetcher::new(&NetworkConfig::default()).unwrap();

        // Bind then drop a listener so the port is known to refuse connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let source = StreamSource::new(format!("http://127.0.0.1:{port}/video.m4s"));
        let result = fetcher.fetch(&source, &destination, &|_: f64| {}).await;

        assert!(matches!(result, Err(FetchError::NetworkFailure { .. })));
        assert!(!destination.exists());
    }
}
