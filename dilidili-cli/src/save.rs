//! Saving the merged file and cleaning up scratch artifacts.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dilidili_core::PipelineOutput;

/// Characters that are invalid in file names on at least one platform.
const RESERVED_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Replaces reserved characters in `title` with `_`.
///
/// Falls back to `video` when nothing printable is left.
pub fn sanitize_file_name(title: &str) -> String {
    let sanitized: String = title
        .chars()
        .map(|c| {
            if RESERVED_CHARS.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let trimmed = sanitized.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        "video".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Copies `merged` to `<dest_dir>/<sanitized title>.<ext>`.
///
/// Creates `dest_dir` if needed and overwrites an existing file.
///
/// # Errors
/// Directory creation or copy failure, with the paths involved.
pub async fn save_output(merged: &Path, title: &str, dest_dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", dest_dir.display()))?;

    let extension = merged
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("mp4");
    let destination = dest_dir.join(format!("{}.{extension}", sanitize_file_name(title)));

    tokio::fs::copy(merged, &destination).await.with_context(|| {
        format!(
            "Failed to copy {} to {}",
            merged.display(),
            destination.display()
        )
    })?;

    tracing::info!("Saved {} to {}", merged.display(), destination.display());
    Ok(destination)
}

/// Removes the merged file, both fragments, and the scratch directory.
///
/// Best effort: failures are logged, the directory is kept when not empty.
pub async fn cleanup(output: &PipelineOutput) {
    for path in [
        &output.mux.output_path,
        &output.video_path,
        &output.audio_path,
    ] {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {}: {}", path.display(), e),
        }
    }

    if let Err(e) = tokio::fs::remove_dir(&output.scratch_dir).await {
        tracing::debug!(
            "Keeping scratch directory {}: {}",
            output.scratch_dir.display(),
            e
        );
    }
}
