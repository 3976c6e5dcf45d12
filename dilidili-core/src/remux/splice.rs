//! In-process fragment splice.
//!
//! Writes one canonical ftyp box, then the video fragment and the audio
//! fragment with their own leading ftyp boxes removed. Fragments are
//! concatenated, not re-indexed, so playback depends on the two inputs
//! sharing compatible fragmentation boundaries.

use std::path::Path;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::boxes::{CANONICAL_FTYP_BOX, find_first_non_ftyp_box};
use super::{MuxError, MuxResult, MuxStrategy};

/// Native box-splice strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxSpliceMuxer;

impl BoxSpliceMuxer {
    pub fn new() -> Self {
        Self
    }
}

async fn read_fragment(path: &Path) -> Result<Vec<u8>, MuxError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| MuxError::ReadFailure {
            path: path.to_path_buf(),
            source: e,
        })
}

#[async_trait]
impl MuxStrategy for BoxSpliceMuxer {
    async fn mux(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<MuxResult, MuxError> {
        let video_data = read_fragment(video_path).await?;
        let audio_data = read_fragment(audio_path).await?;

        let video_start = find_first_non_ftyp_box(&video_data);
        let audio_start = find_first_non_ftyp_box(&audio_data);
        tracing::debug!(
            "Fragment payload offsets: video={} of {}, audio={} of {}",
            video_start,
            video_data.len(),
            audio_start,
            audio_data.len()
        );

        let write_failure = |e: std::io::Error| MuxError::WriteFailure {
            path: output_path.to_path_buf(),
            source: e,
        };

        let mut output = tokio::fs::File::create(output_path)
            .await
            .map_err(write_failure)?;

        let sections: [&[u8]; 3] = [
            &CANONICAL_FTYP_BOX,
            &video_data[video_start..],
            &audio_data[audio_start..],
        ];
        let mut byte_count = 0u64;
        for section in sections {
            output.write_all(section).await.map_err(write_failure)?;
            byte_count += section.len() as u64;
        }
        output.flush().await.map_err(write_failure)?;

        Ok(MuxResult {
            output_path: output_path.to_path_buf(),
            byte_count,
        })
    }

    fn name(&self) -> &'static str {
        "native"
    }
}
