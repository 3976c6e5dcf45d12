//! Presentation events and their single-writer forwarding task.
//!
//! Workers never touch the presentation collaborator. They push events into
//! an unbounded channel; one forwarder task owns every call into the sink, so
//! status updates from both fetch workers are applied one at a time, in the
//! order they were sent.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::coordinator::PairCallbacks;

/// Receiver of pipeline status and progress.
///
/// Calls arrive from the forwarder task, not from the caller's task.
pub trait PresentationSink: Send + Sync {
    fn set_status(&self, text: &str);
    fn set_video_progress(&self, fraction: f64);
    fn set_audio_progress(&self, fraction: f64);
    fn set_overall_progress(&self, fraction: f64);

    /// Invoked once on success with the merged file and display title.
    ///
    /// Ownership of the file passes to the sink (save, export, cleanup).
    fn on_complete(&self, output_path: &Path, title: &str);
}

/// One presentation update.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Status(String),
    VideoProgress(f64),
    AudioProgress(f64),
    OverallProgress(f64),
}

impl PipelineEvent {
    fn deliver(self, sink: &dyn PresentationSink) {
        match self {
            PipelineEvent::Status(text) => sink.set_status(&text),
            PipelineEvent::VideoProgress(f) => sink.set_video_progress(f),
            PipelineEvent::AudioProgress(f) => sink.set_audio_progress(f),
            PipelineEvent::OverallProgress(f) => sink.set_overall_progress(f),
        }
    }
}

#[derive(Debug)]
enum ForwarderMessage {
    Event(PipelineEvent),
    Flush(oneshot::Sender<()>),
}

/// Cloneable handle for emitting events from any task.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::UnboundedSender<ForwarderMessage>,
}

impl EventSender {
    pub fn send(&self, event: PipelineEvent) {
        if self.sender.send(ForwarderMessage::Event(event)).is_err() {
            tracing::trace!("Presentation forwarder gone, dropping event");
        }
    }

    pub fn status(&self, text: impl Into<String>) {
        self.send(PipelineEvent::Status(text.into()));
    }

    pub fn video_progress(&self, fraction: f64) {
        self.send(PipelineEvent::VideoProgress(fraction));
    }

    pub fn audio_progress(&self, fraction: f64) {
        self.send(PipelineEvent::AudioProgress(fraction));
    }

    pub fn overall_progress(&self, fraction: f64) {
        self.send(PipelineEvent::OverallProgress(fraction));
    }

    /// Coordinator callbacks that route into this channel.
    pub fn pair_callbacks(&self) -> PairCallbacks {
        let status = self.clone();
        let video = self.clone();
        let audio = self.clone();
        PairCallbacks {
            on_status: Arc::new(move |text: String| status.status(text)),
            on_video_progress: Arc::new(move |f: f64| video.video_progress(f)),
            on_audio_progress: Arc::new(move |f: f64| audio.audio_progress(f)),
        }
    }
}

/// Event channel plus the forwarder task draining it into a sink.
pub struct EventChannel {
    sender: EventSender,
    forwarder: JoinHandle<()>,
}

impl EventChannel {
    /// Spawns the forwarder task for `sink`.
    pub fn spawn(sink: Arc<dyn PresentationSink>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<ForwarderMessage>();

        let forwarder = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                match message {
                    ForwarderMessage::Event(event) => event.deliver(sink.as_ref()),
                    ForwarderMessage::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self {
            sender: EventSender { sender },
            forwarder,
        }
    }

    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Waits until every event sent before this call has reached the sink.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .sender
            .sender
            .send(ForwarderMessage::Flush(done_tx))
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }
}

impl Drop for EventChannel {
    fn drop(&mut self) {
        // Outstanding sender clones would otherwise keep the forwarder alive.
        self.forwarder.abort();
    }
}
