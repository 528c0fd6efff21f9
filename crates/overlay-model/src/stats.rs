//! Progress statistics and log lines reported by a running render.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier correlating every event of one engine execution.
pub type ExecutionId = i64;

/// Encoding statistics for a running execution.
///
/// Acts as an accumulator: see [`ProgressStatistics::merge`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressStatistics {
    pub execution_id: ExecutionId,

    /// Last encoded video frame.
    pub frame_number: i32,

    /// Encoding throughput in frames per second.
    pub fps: f32,

    /// Encoder quantizer of the video stream.
    pub quality: f32,

    /// Bytes written to the output so far.
    pub size_bytes: i64,

    /// Output timestamp reached, in milliseconds.
    pub elapsed_time_ms: i32,

    /// Output bitrate in kbit/s.
    pub bitrate: f64,

    /// Encoding speed relative to realtime.
    pub speed: f64,
}

impl ProgressStatistics {
    /// An empty accumulator for `execution_id`.
    pub fn new(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            ..Self::default()
        }
    }

    /// Fold a partial update into this accumulator.
    ///
    /// The execution id is always taken from `update`. Every measurement is only
    /// overwritten when the new value is positive, so a tick that did not report a
    /// field keeps the last known value. A genuine zero is indistinguishable from
    /// "not reported" and is ignored as well.
    pub fn merge(&mut self, update: &ProgressStatistics) {
        self.execution_id = update.execution_id;
        if update.frame_number > 0 {
            self.frame_number = update.frame_number;
        }
        if update.fps > 0.0 {
            self.fps = update.fps;
        }
        if update.quality > 0.0 {
            self.quality = update.quality;
        }
        if update.size_bytes > 0 {
            self.size_bytes = update.size_bytes;
        }
        if update.elapsed_time_ms > 0 {
            self.elapsed_time_ms = update.elapsed_time_ms;
        }
        if update.bitrate > 0.0 {
            self.bitrate = update.bitrate;
        }
        if update.speed > 0.0 {
            self.speed = update.speed;
        }
    }
}

impl fmt::Display for ProgressStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "execution={} frame={} fps={} q={} size={}B time={}ms bitrate={}kbits/s speed={}x",
            self.execution_id,
            self.frame_number,
            self.fps,
            self.quality,
            self.size_bytes,
            self.elapsed_time_ms,
            self.bitrate,
            self.speed
        )
    }
}

/// One log line emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub execution_id: ExecutionId,
    pub text: String,
}

impl ExecutionLog {
    pub fn new(execution_id: ExecutionId, text: impl Into<String>) -> Self {
        Self {
            execution_id,
            text: text.into(),
        }
    }
}

impl fmt::Display for ExecutionLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "execution={} '{}'", self.execution_id, self.text)
    }
}
