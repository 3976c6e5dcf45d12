//! External media tool strategy.
//!
//! Delegates the merge to an ffmpeg-compatible executable that copies both
//! input streams into one container without re-encoding.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{MuxError, MuxResult, MuxStrategy};

/// Muxes by invoking an external executable found through discovery.
#[derive(Debug, Clone)]
pub struct ExternalToolMuxer {
    tool_name: String,
    search_dirs: Vec<PathBuf>,
}

impl ExternalToolMuxer {
    /// Creates a muxer looking for `tool_name`, probing `search_dirs`
    /// (relative to the working directory) before `PATH`.
    pub fn new(tool_name: impl Into<String>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            tool_name: tool_name.into(),
            search_dirs,
        }
    }
}

/// Appends the platform executable suffix when the name has no extension.
fn executable_file_name(tool_name: &str) -> String {
    let suffix = std::env::consts::EXE_SUFFIX;
    if suffix.is_empty() || Path::new(tool_name).extension().is_some() {
        tool_name.to_string()
    } else {
        format!("{tool_name}{suffix}")
    }
}

/// Every location probed for `tool_name`, in discovery order.
///
/// Application bundle first (beside the executable, then its `Resources`
/// sibling), then `search_dirs`, then each `PATH` entry.
pub fn candidate_paths(
    tool_name: &str,
    search_dirs: &[PathBuf],
    exe_dir: Option<&Path>,
    path_var: Option<&OsStr>,
) -> Vec<PathBuf> {
    let file_name = executable_file_name(tool_name);
    let mut candidates = Vec::new();

    if let Some(dir) = exe_dir {
        candidates.push(dir.join(&file_name));
        candidates.push(dir.join("..").join("Resources").join(&file_name));
    }

    candidates.extend(search_dirs.iter().map(|dir| dir.join(&file_name)));

    if let Some(path_var) = path_var {
        candidates.extend(std::env::split_paths(path_var).map(|dir| dir.join(&file_name)));
    }

    candidates
}

/// Locates `tool_name` using the process environment.
///
/// # Errors
/// - `MuxError::ToolNotFound` - No candidate location holds the executable
pub fn locate_tool(tool_name: &str, search_dirs: &[PathBuf]) -> Result<PathBuf, MuxError> {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    let path_var = std::env::var_os("PATH");

    let candidates = candidate_paths(
        tool_name,
        search_dirs,
        exe_dir.as_deref(),
        path_var.as_deref(),
    );

    if let Some(found) = candidates.iter().find(|candidate| candidate.is_file()).cloned() {
        tracing::debug!("Located {} at {}", tool_name, found.display());
        return Ok(found);
    }

    Err(MuxError::ToolNotFound {
        tool: tool_name.to_string(),
        searched: candidates,
    })
}

async fn ensure_readable(path: &Path) -> Result<(), MuxError> {
    tokio::fs::File::open(path)
        .await
        .map(|_| ())
        .map_err(|e| MuxError::ReadFailure {
            path: path.to_path_buf(),
            source: e,
        })
}

#[async_trait]
impl MuxStrategy for ExternalToolMuxer {
    async fn mux(
        &self,
        video_path: &Path,
        audio_path: &Path,
        output_path: &Path,
    ) -> Result<MuxResult, MuxError> {
        ensure_readable(video_path).await?;
        ensure_readable(audio_path).await?;

        let tool = locate_tool(&self.tool_name, &self.search_dirs)?;

        let mut cmd = tokio::process::Command::new(&tool);
        cmd.arg("-y") // Overwrite output file
            .arg("-i")
            .arg(video_path)
            .arg("-i")
            .arg(audio_path)
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("1:a:0")
            .arg("-c")
            .arg("copy")
            .arg(output_path);

        tracing::info!("Executing external mux command: {:?}", cmd);

        let output = cmd.output().await.map_err(|e| MuxError::ExternalToolFailed {
            tool: tool.clone(),
            status: "failed to start".to_string(),
            stderr: e.to_string(),
        })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            tracing::error!("{} exited with {}: {}", tool.display(), output.status, stderr);
            return Err(MuxError::ExternalToolFailed {
                tool,
                status: output.status.to_string(),
                stderr,
            });
        }
        if !stderr.is_empty() {
            tracing::debug!("{} stderr: {}", tool.display(), stderr);
        }

        let byte_count = tokio::fs::metadata(output_path)
            .await
            .map_err(|e| MuxError::WriteFailure {
                path: output_path.to_path_buf(),
                source: e,
            })?
            .len();

        Ok(MuxResult {
            output_path: output_path.to_path_buf(),
            byte_count,
        })
    }

    fn name(&self) -> &'static str {
        "external"
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_candidate_order() {
        let exe_dir = PathBuf::from("/opt/app/bin");
        let search_dirs = vec![PathBuf::from("."), PathBuf::from("tools")];
        let path_var = std::env::join_paths(["/usr/local/bin", "/usr/bin"]).unwrap();

        let candidates = candidate_paths(
            "ffmpeg",
            &search_dirs,
            Some(&exe_dir),
            Some(path_var.as_os_str()),
        );
        let name = executable_file_name("ffmpeg");

        assert_eq!(
            candidates,
            vec![
                exe_dir.join(&name),
                exe_dir.join("..").join("Resources").join(&name),
                PathBuf::from(".").join(&name),
                PathBuf::from("tools").join(&name),
                PathBuf::from("/usr/local/bin").join(&name),
                PathBuf::from("/usr/bin").join(&name),
            ]
        );
    }

    #[test]
    fn test_missing_tool_reports_every_candidate() {
        let temp_dir = tempdir().unwrap();
        let result = locate_tool(
            "dilidili-no-such-tool-7f3a",
            &[temp_dir.path().to_path_buf()],
        );

        match result {
            Err(MuxError::ToolNotFound { tool, searched }) => {
                assert_eq!(tool, "dilidili-no-such-tool-7f3a");
                assert!(searched.iter().any(|p| p.starts_with(temp_dir.path())));
            }
            other => panic!("expected ToolNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_input_is_read_failure_before_discovery() {
        let temp_dir = tempdir().unwrap();
        let muxer = ExternalToolMuxer::new("dilidili-no-such-tool-7f3a", vec![]);

        let result = muxer
            .mux(
                &temp_dir.path().join("v.m4s"),
                &temp_dir.path().join("a.m4s"),
                &temp_dir.path().join("out.mp4"),
            )
            .await;

        assert!(matches!(result, Err(MuxError::ReadFailure { .. })));
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_tool_in_search_dir_is_invoked() {
        let temp_dir = tempdir().unwrap();
        let tools = temp_dir.path().join("tools");
        std::fs::create_dir(&tools).unwrap();
        // Last argument is the output path.
        write_script(&tools, "fake-mux", "for last; do :; done\nprintf 'merged!' > \"$last\"");

        let video_path = temp_dir.path().join("v.m4s");
        let audio_path = temp_dir.path().join("a.m4s");
        let output_path = temp_dir.path().join("out.mp4");
        std::fs::write(&video_path, b"video").unwrap();
        std::fs::write(&audio_path, b"audio").unwrap();

        let muxer = ExternalToolMuxer::new("fake-mux", vec![tools]);
        let result = muxer
            .mux(&video_path, &audio_path, &output_path)
            .await
            .unwrap();

        assert_eq!(result.byte_count, 7);
        assert_eq!(std::fs::read(&output_path).unwrap(), b"merged!");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_is_external_tool_failed() {
        let temp_dir = tempdir().unwrap();
        write_script(temp_dir.path(), "broken-mux", "echo 'codec exploded' >&2\nexit 3");

        let video_path = temp_dir.path().join("v.m4s");
        let audio_path = temp_dir.path().join("a.m4s");
        std::fs::write(&video_path, b"video").unwrap();
        std::fs::write(&audio_path, b"audio").unwrap();

        let muxer = ExternalToolMuxer::new("broken-mux", vec![temp_dir.path().to_path_buf()]);
        let result = muxer
            .mux(&video_path, &audio_path, &temp_dir.path().join("out.mp4"))
            .await;

        match result {
            Err(MuxError::ExternalToolFailed { stderr, .. }) => {
                assert_eq!(stderr, "codec exploded");
            }
            other => panic!("expected ExternalToolFailed, got {other:?}"),
        }
    }
}
