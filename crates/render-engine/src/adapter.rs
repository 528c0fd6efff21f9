//! Translation of raw engine events into the caller-facing model.

use vidmark_overlay_model::{ExecutionId, ExecutionLog, ProgressStatistics};

use crate::engine::{EngineEvent, EngineOutcome};

/// What the adapter hands on to the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Log(ExecutionLog),
    /// Accumulated statistics after merging the latest tick.
    Statistics(ProgressStatistics),
    Success,
    Cancel,
    Failure(String),
}

impl AdapterEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Cancel | Self::Failure(_))
    }
}

/// Stateful filter bound to one execution.
///
/// Owns the statistics accumulator; nothing is emitted once a terminal event has
/// passed, and events for other executions are dropped.
#[derive(Debug)]
pub struct EngineEventAdapter {
    execution_id: ExecutionId,
    statistics: ProgressStatistics,
    terminated: bool,
    suppressed: u64,
}

impl EngineEventAdapter {
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            statistics: ProgressStatistics::new(execution_id),
            terminated: false,
            suppressed: 0,
        }
    }

    /// Events dropped because they were stale or foreign.
    pub fn suppressed(&self) -> u64 {
        self.suppressed
    }

    /// Latest accumulated statistics.
    pub fn statistics(&self) -> &ProgressStatistics {
        &self.statistics
    }

    pub fn handle(&mut self, event: EngineEvent) -> Option<AdapterEvent> {
        if event.execution_id() != self.execution_id {
            tracing::debug!(
                execution_id = self.execution_id,
                foreign = event.execution_id(),
                "Dropping event for another execution"
            );
            self.suppressed += 1;
            return None;
        }
        if self.terminated {
            tracing::debug!(
                execution_id = self.execution_id,
                "Dropping event received after termination"
            );
            self.suppressed += 1;
            return None;
        }

        let mapped = match event {
            EngineEvent::Log { execution_id, text } => {
                AdapterEvent::Log(ExecutionLog::new(execution_id, text))
            }
            EngineEvent::Statistics(tick) => {
                self.statistics.merge(&tick);
                AdapterEvent::Statistics(self.statistics)
            }
            EngineEvent::Completed { outcome, .. } => {
                self.terminated = true;
                match outcome {
                    EngineOutcome::Success => AdapterEvent::Success,
                    EngineOutcome::Cancelled => AdapterEvent::Cancel,
                    EngineOutcome::Failed { reason } => AdapterEvent::Failure(reason),
                }
            }
        };
        Some(mapped)
    }
}
