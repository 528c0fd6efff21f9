//! Contract with the external media engine.

use tokio::sync::mpsc;

use vidmark_common::error::VidmarkResult;
use vidmark_overlay_model::{ExecutionId, ProgressStatistics};

/// Sender half the engine pushes its events into.
pub type EngineEventSender = mpsc::UnboundedSender<EngineEvent>;

/// Raw event emitted by an engine execution.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A line of engine log output.
    Log {
        execution_id: ExecutionId,
        text: String,
    },

    /// A statistics tick. Fields the engine did not report are zero.
    Statistics(ProgressStatistics),

    /// The execution ended.
    Completed {
        execution_id: ExecutionId,
        outcome: EngineOutcome,
    },
}

impl EngineEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            Self::Log { execution_id, .. } | Self::Completed { execution_id, .. } => *execution_id,
            Self::Statistics(stats) => stats.execution_id,
        }
    }
}

/// How an execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineOutcome {
    Success,
    Cancelled,
    Failed { reason: String },
}

/// Trait for media engines (ffmpeg subprocess, in-process library, test doubles).
pub trait MediaEngine: Send + Sync {
    /// Start executing `args` and return immediately.
    ///
    /// Progress, log output, and exactly one `Completed` event are sent to `events`.
    /// Called from within the tokio runtime.
    fn execute(
        &self,
        execution_id: ExecutionId,
        args: Vec<String>,
        events: EngineEventSender,
    ) -> VidmarkResult<()>;

    /// Ask a running execution to stop. Unknown ids are ignored.
    fn cancel(&self, execution_id: ExecutionId);

    /// Check if this engine is available on the system.
    fn is_available(&self) -> bool;

    /// Engine name.
    fn name(&self) -> &str;
}
