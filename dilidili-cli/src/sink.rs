//! Terminal presentation of pipeline status and progress.

use std::io::Write;
use std::path::{Path, PathBuf};

use dilidili_core::PresentationSink;
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ConsoleState {
    video: f64,
    audio: f64,
    overall: f64,
    progress_line_open: bool,
    completed: Option<(PathBuf, String)>,
}

/// Prints status lines and a single rewritten progress line to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    state: Mutex<ConsoleState>,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merged file and title handed over on success.
    pub fn completed(&self) -> Option<(PathBuf, String)> {
        self.state.lock().completed.clone()
    }

    fn redraw(&self, update: impl FnOnce(&mut ConsoleState)) {
        let mut state = self.state.lock();
        update(&mut state);
        let line = render_progress(state.video, state.audio, state.overall);
        state.progress_line_open = true;

        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{line}");
        let _ = stderr.flush();
    }
}

/// One-line progress summary, percentages rounded down.
pub fn render_progress(video: f64, audio: f64, overall: f64) -> String {
    format!(
        "video {:>3}% | audio {:>3}% | overall {:>3}%",
        percent(video),
        percent(audio),
        percent(overall)
    )
}

fn percent(fraction: f64) -> u32 {
    (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32
}

impl PresentationSink for ConsoleSink {
    fn set_status(&self, text: &str) {
        let mut state = self.state.lock();
        let mut stderr = std::io::stderr().lock();
        if state.progress_line_open {
            let _ = writeln!(stderr);
            state.progress_line_open = false;
        }
        let _ = writeln!(stderr, "{text}");
    }

    fn set_video_progress(&self, fraction: f64) {
        self.redraw(|state| state.video = fraction);
    }

    fn set_audio_progress(&self, fraction: f64) {
        self.redraw(|state| state.audio = fraction);
    }

    fn set_overall_progress(&self, fraction: f64) {
        self.redraw(|state| state.overall = fraction);
    }

    fn on_complete(&self, output_path: &Path, title: &str) {
        self.state.lock().completed = Some((output_path.to_path_buf(), title.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_progress() {
        assert_eq!(
            render_progress(0.0, 0.5, 0.8),
            "video   0% | audio  50% | overall  80%"
        );
        assert_eq!(
            render_progress(1.0, 0.999, 1.7),
            "video 100% | audio  99% | overall 100%"
        );
    }

    #[test]
    fn test_completion_is_recorded() {
        let sink = ConsoleSink::new();
        assert!(sink.completed().is_none());

        sink.set_status("Muxing video and audio...");
        sink.set_overall_progress(0.8);
        sink.on_complete(Path::new("/scratch/BV1/BV1_merged.mp4"), "Cats");

        assert_eq!(
            sink.completed(),
            Some((PathBuf::from("/scratch/BV1/BV1_merged.mp4"), "Cats".to_string()))
        );
        assert_eq!(sink.state.lock().overall, 0.8);
    }
}
