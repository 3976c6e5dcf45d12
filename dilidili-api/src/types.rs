//! Wire types of the Bilibili web API.

use dilidili_core::StreamSource;
use serde::{Deserialize, Serialize};

/// Common response wrapper: `{code, message, data}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Zero on success
    pub code: i64,
    /// Human readable status, often empty on success
    #[serde(default)]
    pub message: String,
    /// Payload, absent or null on most failures
    pub data: Option<T>,
}

/// Payload of `/x/web-interface/view`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewData {
    /// Display title
    pub title: String,
    /// Content id of the first page
    pub cid: u64,
}

/// Payload of `/x/player/playurl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayUrlData {
    /// Separate video and audio streams; absent for legacy muxed formats
    pub dash: Option<DashInfo>,
}

/// DASH stream lists, best quality first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashInfo {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub video: Vec<DashStream>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub audio: Vec<DashStream>,
}

/// One DASH representation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashStream {
    /// Quality id
    #[serde(default)]
    pub id: Option<u32>,
    /// Stream URL on the CDN
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    /// Average bitrate in bits per second
    #[serde(default)]
    pub bandwidth: Option<u64>,
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

impl From<&DashStream> for StreamSource {
    fn from(stream: &DashStream) -> Self {
        // The API announces no byte size; the fetcher uses Content-Length.
        StreamSource::new(stream.base_url.clone())
    }
}

/// Silent videos send `"audio": null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
