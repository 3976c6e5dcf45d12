//! Container remuxing of a video fragment file and an audio fragment file.
//!
//! Two interchangeable strategies produce the merged container: an in-process
//! box splice, and delegation to an external media tool. Deployment
//! configuration picks one.

pub mod boxes;
pub mod external;
pub mod splice;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

pub use external::{ExternalToolMuxer, locate_tool};
pub use splice::BoxSpliceMuxer;

use crate::config::MuxConfig;

/// Errors that can occur while producing the merged container.
///
/// Any partially written output is undefined and must be discarded.
#[derive(Debug, Error)]
pub enum MuxError {
    /// An input fragment file could not be opened or read.
    #[error("Failed to read {}: {source}", .path.display())]
    ReadFailure {
        /// Input path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The output file could not be created or written.
    #[error("Failed to write {}: {source}", .path.display())]
    WriteFailure {
        /// Output path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The external media tool was not found by discovery.
    #[error("External tool '{tool}' not found (searched {} locations)", .searched.len())]
    ToolNotFound {
        /// Executable name being searched for
        tool: String,
        /// Every candidate path that was probed
        searched: Vec<PathBuf>,
    },

    /// The external media tool ran but failed.
    #[error("External tool {} failed ({status}): {stderr}", .tool.display())]
    ExternalToolFailed {
        /// Resolved tool path
        tool: PathBuf,
        /// Exit status description
        status: String,
        /// Captured standard error
        stderr: String,
    },
}

/// Terminal artifact of a successful mux.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxResult {
    /// Path of the merged container
    pub output_path: PathBuf,
    /// Size of the merged container in bytes
    pub byte_count: u64,
}

/// Combines a video fragment file and an audio fragment file into one container.
#[async_trait]
pub trait MuxStrategy: Send + Sync {
    /// Writes the merged container to `output_path`.
    ///
    /// # Errors
    /// - `MuxError::ReadFailure` - Either input cannot be read
    /// - `MuxError::WriteFailure` - Output cannot be created or written
    /// - `MuxError::ToolNotFound` - External strategy only
    /// - `MuxError::ExternalToolFailed` - External strategy only
    async fn mux(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<MuxResult, MuxError>;

    /// Short strategy name used in logs.
    fn name(&self) -> &'static str;
}

/// Strategy selection for deployment configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum MuxStrategyKind {
    /// In-process ftyp stripping and fragment concatenation
    Native,
    /// Lossless stream copy by an external media tool
    External,
}

impl std::str::FromStr for MuxStrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "native" => Ok(MuxStrategyKind::Native),
            "external" => Ok(MuxStrategyKind::External),
            _ => Err(format!("Invalid mux strategy: {s}")),
        }
    }
}

impl std::fmt::Display for MuxStrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MuxStrategyKind::Native => write!(f, "native"),
            MuxStrategyKind::External => write!(f, "external"),
        }
    }
}

/// Builds the strategy selected by `config`.
pub fn build_strategy(config: &MuxConfig) -> Arc<dyn MuxStrategy> {
    match config.strategy {
        MuxStrategyKind::Native => Arc::new(BoxSpliceMuxer::new()),
        MuxStrategyKind::External => Arc::new(ExternalToolMuxer::new(
            config.tool_name.clone(),
            config.tool_search_dirs.clone(),
        )),
    }
}

/// Muxes `video_path` and `audio_path` into `output_path` with `strategy`.
///
/// # Errors
/// Propagates the strategy's `MuxError` unchanged.
pub async fn mux(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    strategy: &dyn MuxStrategy,
) -> Result<MuxResult, MuxError> {
    tracing::info!(
        "Muxing {} + {} -> {} using {} strategy",
        video_path.display(),
        audio_path.display(),
        output_path.display(),
        strategy.name()
    );

    let result = strategy.mux(video_path, audio_path, output_path).await;
    match &result {
        Ok(mux_result) => tracing::info!(
            "Mux complete: {} bytes at {}",
            mux_result.byte_count,
            mux_result.output_path.display()
        ),
        Err(e) => tracing::error!("Mux failed: {}", e),
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_kind_parsing() {
        assert_eq!("native".parse::<MuxStrategyKind>(), Ok(MuxStrategyKind::Native));
        assert_eq!(
            "EXTERNAL".parse::<MuxStrategyKind>(),
            Ok(MuxStrategyKind::External)
        );
        assert!("ffmpeg".parse::<MuxStrategyKind>().is_err());
        assert_eq!(MuxStrategyKind::External.to_string(), "external");
    }

    #[test]
    fn test_build_strategy_follows_config() {
        let mut config = MuxConfig::default();
        assert_eq!(build_strategy(&config).name(), "native");

        config.strategy = MuxStrategyKind::External;
        assert_eq!(build_strategy(&config).name(), "external");
    }

    #[test]
    fn test_tool_not_found_message_counts_locations() {
        let error = MuxError::ToolNotFound {
            tool: "ffmpeg".to_string(),
            searched: vec![PathBuf::from("./ffmpeg"), PathBuf::from("bin/ffmpeg")],
        };

        assert_eq!(
            error.to_string(),
            "External tool 'ffmpeg' not found (searched 2 locations)"
        );
    }
}
