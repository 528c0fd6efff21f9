//! Vidmark Render Engine
//!
//! Composites a still image onto a video by driving an external media engine
//! and supervising the run to completion.
//!
//! # Pipeline Architecture
//!
//! ```text
//! RenderRequest ──► RenderOrchestrator::start
//!                        │
//!                        ├── StorageResolver    (handles → paths)
//!                        ├── TempArtifactManager (temp output, view images)
//!                        ├── build_overlay_args  (-i video -i image -filter_complex ...)
//!                        ▼
//!                   MediaEngine ──► EngineEvent ──► EngineEventAdapter
//!                                                         │
//!                        ┌────────────────────────────────┘
//!                        ▼
//!                  RenderCallbacks (progress, logs)
//!                        │ terminal
//!                        ▼
//!                  persist → release temps → hide_loader → on_success / on_failure
//! ```

pub mod adapter;
pub mod callbacks;
pub mod command;
pub mod engine;
pub mod ffmpeg;
pub mod orchestrator;
pub mod storage;
pub mod temp;

pub use adapter::{AdapterEvent, EngineEventAdapter};
pub use callbacks::{ChannelCallbacks, RenderCallbacks, RenderEvent};
pub use command::build_overlay_args;
pub use engine::{EngineEvent, EngineEventSender, EngineOutcome, MediaEngine};
pub use ffmpeg::FfmpegEngine;
pub use orchestrator::{RenderOrchestrator, RenderSettings, RenderState};
pub use storage::{FileSystemStorage, StorageResolver};
pub use temp::{TempArtifact, TempArtifactManager};
