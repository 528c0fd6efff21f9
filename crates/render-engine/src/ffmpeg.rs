//! `ffmpeg` subprocess engine.

use std::collections::{HashMap, VecDeque};
use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdin, Command};
use tokio::sync::oneshot;

use vidmark_common::error::{VidmarkError, VidmarkResult};
use vidmark_overlay_model::{ExecutionId, ProgressStatistics};

use crate::engine::{EngineEvent, EngineEventSender, EngineOutcome, MediaEngine};

/// Flags prepended to every invocation: overwrite the claimed temp output, machine-readable
/// progress on stdout, human log on stderr.
const GLOBAL_ARGS: [&str; 7] = [
    "-y",
    "-hide_banner",
    "-nostats",
    "-loglevel",
    "info",
    "-progress",
    "pipe:1",
];

/// Stderr lines kept to explain a failed exit.
const FAILURE_TAIL_LINES: usize = 12;

type CancelRegistry = Arc<Mutex<HashMap<ExecutionId, oneshot::Sender<()>>>>;

/// Runs renders through an `ffmpeg` binary.
pub struct FfmpegEngine {
    binary: String,
    running: CancelRegistry,
}

impl FfmpegEngine {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Full argument list handed to the process.
    pub fn command_line(args: &[String]) -> Vec<String> {
        GLOBAL_ARGS
            .iter()
            .map(|arg| arg.to_string())
            .chain(args.iter().cloned())
            .collect()
    }
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl MediaEngine for FfmpegEngine {
    fn execute(
        &self,
        execution_id: ExecutionId,
        args: Vec<String>,
        events: EngineEventSender,
    ) -> VidmarkResult<()> {
        let command_line = Self::command_line(&args);
        tracing::debug!(execution_id, binary = %self.binary, args = ?command_line, "Running engine");

        let mut child = Command::new(&self.binary)
            .args(&command_line)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| VidmarkError::engine(format!("Failed to start {}: {e}", self.binary)))?;

        tracing::info!(execution_id, pid = child.id(), "ffmpeg process started");

        let stdin = child.stdin.take();
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| VidmarkError::engine("Failed to capture ffmpeg stdout"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| VidmarkError::engine("Failed to capture ffmpeg stderr"))?;

        let (cancel_tx, mut cancel_rx) = oneshot::channel();
        lock(&self.running).insert(execution_id, cancel_tx);
        let running = Arc::clone(&self.running);
        let binary = self.binary.clone();

        tokio::spawn(async move {
            let log_events = events.clone();
            let stderr_task = tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                let mut tail = VecDeque::with_capacity(FAILURE_TAIL_LINES);
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!(execution_id, "{line}");
                    if tail.len() == FAILURE_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line.clone());
                    let _ = log_events.send(EngineEvent::Log {
                        execution_id,
                        text: line,
                    });
                }
                tail.into_iter().collect::<Vec<_>>().join("\n")
            });

            let stats_events = events.clone();
            let stdout_task = tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                let mut block = ProgressBlock::new(execution_id);
                while let Ok(Some(line)) = lines.next_line().await {
                    let Some((key, value)) = line.trim().split_once('=') else {
                        continue;
                    };
                    if let Some(tick) = block.update(key, value) {
                        let _ = stats_events.send(EngineEvent::Statistics(tick));
                    }
                }
            });

            let mut stdin = stdin;
            let mut cancelled = false;
            let status = tokio::select! {
                status = child.wait() => status,
                Ok(()) = &mut cancel_rx => {
                    cancelled = true;
                    request_quit(execution_id, stdin.take()).await;
                    child.wait().await
                }
            };
            drop(stdin);
            lock(&running).remove(&execution_id);

            let _ = stdout_task.await;
            let stderr_tail = stderr_task.await.unwrap_or_default();

            let outcome = if cancelled {
                EngineOutcome::Cancelled
            } else {
                match status {
                    Ok(status) if status.success() => EngineOutcome::Success,
                    Ok(status) => EngineOutcome::Failed {
                        reason: format!("{binary} exited with {status}: {}", stderr_tail.trim()),
                    },
                    Err(e) => EngineOutcome::Failed {
                        reason: format!("Failed to wait on {binary}: {e}"),
                    },
                }
            };
            tracing::info!(execution_id, ?outcome, "ffmpeg process finished");
            let _ = events.send(EngineEvent::Completed {
                execution_id,
                outcome,
            });
        });

        Ok(())
    }

    fn cancel(&self, execution_id: ExecutionId) {
        if let Some(tx) = lock(&self.running).remove(&execution_id) {
            tracing::info!(execution_id, "Requesting ffmpeg to stop");
            let _ = tx.send(());
        }
    }

    fn is_available(&self) -> bool {
        std::process::Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// ffmpeg stops gracefully, finalizing the container, on `q`.
async fn request_quit(execution_id: ExecutionId, stdin: Option<ChildStdin>) {
    let Some(mut stdin) = stdin else {
        tracing::warn!(execution_id, "ffmpeg stdin unavailable, cannot request stop");
        return;
    };
    let result = async {
        stdin.write_all(b"q\n").await?;
        stdin.flush().await
    }
    .await;
    if let Err(err) = result {
        tracing::warn!(execution_id, error = %err, "Failed to send stop request to ffmpeg");
    }
}

/// Accumulates one `-progress` block (terminated by a `progress=` line).
#[derive(Debug)]
struct ProgressBlock {
    current: ProgressStatistics,
}

impl ProgressBlock {
    fn new(execution_id: ExecutionId) -> Self {
        Self {
            current: ProgressStatistics::new(execution_id),
        }
    }

    /// Feed one `key=value` pair; returns the finished tick at the end of a block.
    fn update(&mut self, key: &str, value: &str) -> Option<ProgressStatistics> {
        let value = value.trim();
        match key {
            "frame" => self.current.frame_number = value.parse().unwrap_or(0),
            "fps" => self.current.fps = value.parse().unwrap_or(0.0),
            "stream_0_0_q" => self.current.quality = value.parse().unwrap_or(0.0),
            "total_size" => self.current.size_bytes = value.parse().unwrap_or(0),
            // Both keys carry microseconds.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.current.elapsed_time_ms =
                        i32::try_from(us / 1000).unwrap_or(i32::MAX);
                }
            }
            "bitrate" => {
                self.current.bitrate = value
                    .trim_end_matches("kbits/s")
                    .trim()
                    .parse()
                    .unwrap_or(0.0)
            }
            "speed" => {
                self.current.speed = value.trim_end_matches('x').trim().parse().unwrap_or(0.0)
            }
            "progress" => {
                let execution_id = self.current.execution_id;
                return Some(std::mem::replace(
                    &mut self.current,
                    ProgressStatistics::new(execution_id),
                ));
            }
            _ => {}
        }
        None
    }
}
