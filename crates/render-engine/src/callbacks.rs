//! Caller-facing callback contract.

use serde::Serialize;
use tokio::sync::mpsc;

use vidmark_overlay_model::{DurableArtifactHandle, ExecutionLog, ProgressStatistics};

/// Receives everything a render reports.
///
/// Callbacks run on the supervisor task. Callers that need them on a specific
/// context (a UI thread, a main loop) should use [`ChannelCallbacks`].
///
/// The orchestrator still reports the run as in flight while the terminal
/// callback executes, so starting the next run from inside it is rejected.
pub trait RenderCallbacks: Send + Sync {
    fn show_loader(&self);

    fn hide_loader(&self);

    fn on_progress(&self, statistics: ProgressStatistics);

    fn on_log(&self, log: ExecutionLog);

    fn on_success(&self, output: DurableArtifactHandle);

    fn on_failure(&self);

    /// Cancellation is reported as a failure unless overridden.
    fn on_cancel(&self) {
        self.on_failure();
    }
}

/// A callback invocation as a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RenderEvent {
    ShowLoader,
    HideLoader,
    Progress(ProgressStatistics),
    Log(ExecutionLog),
    Success { output: DurableArtifactHandle },
    Failure,
    Cancelled,
}

impl RenderEvent {
    /// Whether this is the last event of a run.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure | Self::Cancelled)
    }
}

/// Forwards every callback into an unbounded channel the caller drains on its own context.
#[derive(Debug, Clone)]
pub struct ChannelCallbacks {
    tx: mpsc::UnboundedSender<RenderEvent>,
}

impl ChannelCallbacks {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<RenderEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: RenderEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Render event receiver dropped");
        }
    }
}

impl RenderCallbacks for ChannelCallbacks {
    fn show_loader(&self) {
        self.forward(RenderEvent::ShowLoader);
    }

    fn hide_loader(&self) {
        self.forward(RenderEvent::HideLoader);
    }

    fn on_progress(&self, statistics: ProgressStatistics) {
        self.forward(RenderEvent::Progress(statistics));
    }

    fn on_log(&self, log: ExecutionLog) {
        self.forward(RenderEvent::Log(log));
    }

    fn on_success(&self, output: DurableArtifactHandle) {
        self.forward(RenderEvent::Success { output });
    }

    fn on_failure(&self) {
        self.forward(RenderEvent::Failure);
    }

    fn on_cancel(&self) {
        self.forward(RenderEvent::Cancelled);
    }
}
