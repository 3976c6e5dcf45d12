//! Configuration for Dilidili.
//!
//! Network headers, scratch layout, and mux strategy selection. Defaults
//! match the public Bilibili CDN; `DILIDILI_*` variables override them.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, InvalidHeaderValue, REFERER};
use thiserror::Error;

use crate::remux::MuxStrategyKind;

/// Settings for one pipeline, grouped by the component that reads them.
#[derive(Debug, Clone, Default)]
pub struct DilidiliConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub mux: MuxConfig,
}

/// HTTP fetch configuration.
///
/// The content origin rejects requests that do not look like they come from
/// a browser on its own site, so user agent and referer are always sent.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent for every HTTP request
    pub user_agent: String,
    /// Referer header matching the content origin
    pub referer: String,
    /// Maximum bytes written per chunk before progress is reported
    pub chunk_size: usize,
    /// TCP connect timeout (reads themselves are never timed out)
    pub connect_timeout: Duration,
}

/// Errors building an HTTP client from [`NetworkConfig`].
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid referer '{referer}': {source}")]
    InvalidReferer {
        referer: String,
        #[source]
        source: InvalidHeaderValue,
    },

    #[error("{0}")]
    Backend(#[from] reqwest::Error),
}

impl NetworkConfig {
    /// Client sending the configured user agent and referer on every request.
    ///
    /// # Errors
    /// - `ClientBuildError::InvalidReferer` - Referer is not a header value
    /// - `ClientBuildError::Backend` - TLS backend failed to initialise
    pub fn build_client(&self) -> Result<reqwest::Client, ClientBuildError> {
        let referer =
            HeaderValue::from_str(&self.referer).map_err(|e| ClientBuildError::InvalidReferer {
                referer: self.referer.clone(),
                source: e,
            })?;
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, referer);

        let client = reqwest::Client::builder()
            .user_agent(self.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(self.connect_timeout)
            .build()?;
        Ok(client)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/114.0.0.0 Safari/537.36"
                .to_string(),
            referer: "https://www.bilibili.com/".to_string(),
            chunk_size: 32 * 1024, // 32 KiB
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Local scratch storage configuration.
///
/// Each pipeline invocation works inside its own
/// `<scratch_root>/<identifier>-<random>/` directory, so reruns of one
/// identifier (in this process or another) never share files.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for per-invocation scratch subdirectories
    pub scratch_root: PathBuf,
    /// Extension of the downloaded video fragment file
    pub video_extension: String,
    /// Extension of the downloaded audio fragment file
    pub audio_extension: String,
    /// Extension of the merged output container
    pub output_extension: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            scratch_root: std::env::temp_dir().join("dilidili"),
            video_extension: "m4s".to_string(),
            audio_extension: "m4s".to_string(),
            output_extension: "mp4".to_string(),
        }
    }
}

impl StorageConfig {
    /// Creates a fresh scratch subdirectory for one invocation of `identifier`.
    ///
    /// The directory outlives this call; whoever takes over the output
    /// removes it.
    ///
    /// # Errors
    /// Returns the I/O error when the root or subdirectory cannot be created.
    pub fn create_scratch_dir(&self, identifier: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("{identifier}-"))
            .rand_bytes(8)
            .tempdir_in(&self.scratch_root)?;
        Ok(dir.keep())
    }
}

/// Container remux configuration.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Which muxing strategy the pipeline uses
    pub strategy: MuxStrategyKind,
    /// Executable name of the external media tool
    pub tool_name: String,
    /// Working-directory-relative directories probed before `PATH`
    pub tool_search_dirs: Vec<PathBuf>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            strategy: MuxStrategyKind::Native,
            tool_name: "ffmpeg".to_string(),
            tool_search_dirs: vec![
                PathBuf::from("."),
                PathBuf::from("bin"),
                PathBuf::from("tools"),
            ],
        }
    }
}

impl DilidiliConfig {
    /// Defaults overlaid with any `DILIDILI_*` variables that are set.
    ///
    /// Empty or unparseable values leave the default in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = std::env::var("DILIDILI_SCRATCH_DIR") {
            if !dir.is_empty() {
                config.storage.scratch_root = PathBuf::from(dir);
            }
        }

        if let Ok(user_agent) = std::env::var("DILIDILI_USER_AGENT") {
            if !user_agent.is_empty() {
                config.network.user_agent = user_agent;
            }
        }

        if let Ok(referer) = std::env::var("DILIDILI_REFERER") {
            if !referer.is_empty() {
                config.network.referer = referer;
            }
        }

        if let Ok(strategy) = std::env::var("DILIDILI_MUX_STRATEGY") {
            if let Ok(kind) = strategy.parse::<MuxStrategyKind>() {
                config.mux.strategy = kind;
            }
        }

        if let Ok(tool) = std::env::var("DILIDILI_TOOL_NAME") {
            if !tool.is_empty() {
                config.mux.tool_name = tool;
            }
        }

        config
    }

    /// Creates a configuration rooted in the given scratch directory.
    pub fn with_scratch_root(scratch_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::default();
        config.storage.scratch_root = scratch_root.into();
        config
    }
}
