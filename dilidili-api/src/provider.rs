//! Bilibili implementation of the pipeline's metadata collaborator.

use async_trait::async_trait;
use dilidili_core::config::NetworkConfig;
use dilidili_core::{MetadataError, MetadataProvider, ResolvedStreams, StreamSource};
use serde::de::DeserializeOwned;
use url::Url;

use crate::errors::ApiError;
use crate::types::{ApiEnvelope, DashInfo, PlayUrlData, ViewData};

/// Production API origin.
pub const DEFAULT_API_BASE: &str = "https://api.bilibili.com/";

/// Quality requested from `playurl` (80 = 1080p).
const PREFERRED_QUALITY: &str = "80";

/// Format flags requested from `playurl` (DASH).
const DASH_FORMAT_FLAGS: &str = "80";

/// Resolves `BV…` identifiers through the public web API.
#[derive(Debug, Clone)]
pub struct BilibiliProvider {
    client: reqwest::Client,
    base_url: Url,
}

impl BilibiliProvider {
    /// Creates a provider against the production API.
    ///
    /// # Errors
    /// - `ApiError::ClientSetup` - Referer or TLS setup rejected
    pub fn new(network: &NetworkConfig) -> Result<Self, ApiError> {
        let client = network.build_client().map_err(|e| ApiError::ClientSetup {
            reason: e.to_string(),
        })?;

        let base_url = Url::parse(DEFAULT_API_BASE).map_err(|e| ApiError::InvalidBaseUrl {
            url: DEFAULT_API_BASE.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self { client, base_url })
    }

    /// Points the provider at another API origin.
    ///
    /// # Errors
    /// - `ApiError::InvalidBaseUrl` - Not an absolute http(s) URL
    pub fn with_base_url(mut self, base_url: &str) -> Result<Self, ApiError> {
        let invalid = |reason: String| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason,
        };

        let mut normalized = base_url.to_string();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        let parsed = Url::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        self.base_url = parsed;
        Ok(self)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Fetches title and content id of `bvid`.
    ///
    /// # Errors
    /// - `ApiError::Rejected` - Non-zero API code
    /// - `ApiError::MissingData` - Envelope without payload
    /// - Network, status, and parse errors from the request
    pub async fn fetch_view(&self, bvid: &str) -> Result<ViewData, ApiError> {
        let url = self.endpoint("x/web-interface/view", &[("bvid", bvid)])?;
        self.get_data(url, "view data").await
    }

    /// Fetches the DASH stream lists of `bvid` page `cid`.
    ///
    /// # Errors
    /// - `ApiError::MissingData` - No DASH section in the payload
    /// - Everything `fetch_view` reports
    pub async fn fetch_dash(&self, bvid: &str, cid: u64) -> Result<DashInfo, ApiError> {
        let cid = cid.to_string();
        let url = self.endpoint(
            "x/player/playurl",
            &[
                ("bvid", bvid),
                ("cid", cid.as_str()),
                ("qn", PREFERRED_QUALITY),
                ("fnval", DASH_FORMAT_FLAGS),
            ],
        )?;
        let data: PlayUrlData = self.get_data(url, "play url data").await?;
        data.dash.ok_or_else(|| ApiError::MissingData {
            what: "data.dash".to_string(),
        })
    }

    fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| ApiError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    async fn get_data<T: DeserializeOwned>(&self, url: Url, what: &str) -> Result<T, ApiError> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ApiError::NetworkError {
                reason: format!("HTTP request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| ApiError::NetworkError {
            reason: format!("reading body failed: {e}"),
        })?;
        let envelope: ApiEnvelope<T> =
            serde_json::from_slice(&body).map_err(|e| ApiError::ParseError {
                reason: format!("JSON parsing failed: {e}"),
            })?;

        if envelope.code != 0 {
            return Err(ApiError::Rejected {
                code: envelope.code,
                message: envelope.message,
            });
        }

        envelope.data.ok_or_else(|| ApiError::MissingData {
            what: what.to_string(),
        })
    }

    async fn resolve(&self, bvid: &str) -> Result<ResolvedStreams, ApiError> {
        let view = self.fetch_view(bvid).await?;
        tracing::info!("Resolved {} to '{}' (cid {})", bvid, view.title, view.cid);

        let dash = self.fetch_dash(bvid, view.cid).await?;
        tracing::debug!(
            "{} offers {} video and {} audio streams",
            bvid,
            dash.video.len(),
            dash.audio.len()
        );

        Ok(ResolvedStreams {
            title: view.title,
            video_sources: dash.video.iter().map(StreamSource::from).collect(),
            audio_sources: dash.audio.iter().map(StreamSource::from).collect(),
        })
    }
}

#[async_trait]
impl MetadataProvider for BilibiliProvider {
    async fn resolve_title_and_streams(
        &self,
        identifier: &str,
    ) -> Result<ResolvedStreams, MetadataError> {
        self.resolve(identifier)
            .await
            .map_err(|e| e.into_metadata_error(identifier))
    }
}
