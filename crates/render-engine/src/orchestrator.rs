//! Render orchestration: one in-flight render, supervised end to end.
//!
//! ```text
//! start(request) ──► Preparing ──► Running ──┬──► Succeeded
//!   (validate)      resolve sources           ├──► Failed
//!                   allocate temp output      └──► Cancelled
//!                   build engine args
//! ```
//!
//! Every terminal transition releases the temp output and any transient overlay
//! before the loader is hidden and the caller is told the result.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::runtime::Handle;
use tokio::sync::mpsc;

use vidmark_common::config::RenderDefaults;
use vidmark_common::error::{VidmarkError, VidmarkResult};
use vidmark_overlay_model::{ExecutionId, MediaSource, OverlaySource, RenderRequest, ResourceHandle};

use crate::adapter::{AdapterEvent, EngineEventAdapter};
use crate::callbacks::RenderCallbacks;
use crate::command::build_overlay_args;
use crate::engine::MediaEngine;
use crate::storage::StorageResolver;
use crate::temp::{TempArtifact, TempArtifactManager};

/// Lifecycle of the orchestrator's current run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// No run started yet.
    Idle,
    /// Sources are being resolved and the engine command built.
    Preparing,
    /// The engine is executing.
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl RenderState {
    /// Whether a run is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Preparing | Self::Running)
    }
}

/// Output format and temp location used for every run.
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub temp_dir: PathBuf,
    pub output_extension: String,
    pub mime_type: String,
}

impl From<&RenderDefaults> for RenderSettings {
    fn from(defaults: &RenderDefaults) -> Self {
        Self {
            temp_dir: defaults.temp_dir.clone(),
            output_extension: defaults.output_extension.clone(),
            mime_type: defaults.mime_type.clone(),
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self::from(&RenderDefaults::default())
    }
}

#[derive(Debug)]
struct Shared {
    state: RenderState,
    current: Option<ExecutionId>,
    last_execution_id: ExecutionId,
    engine_started: bool,
    cancel_requested: bool,
}

/// Everything a run owns and must give back when it ends.
#[derive(Debug, Default)]
struct RunArtifacts {
    output: Option<TempArtifact>,
    overlay_image: Option<TempArtifact>,
    transient_resource: Option<ResourceHandle>,
}

impl RunArtifacts {
    fn release(
        self,
        execution_id: ExecutionId,
        temp: &TempArtifactManager,
        storage: &dyn StorageResolver,
    ) {
        if let Some(output) = self.output {
            temp.release(output);
        }
        if let Some(image) = self.overlay_image {
            temp.release(image);
        }
        if let Some(handle) = self.transient_resource {
            if let Err(err) = storage.delete(&handle) {
                let failure = VidmarkError::cleanup(format!("failed to delete {handle}: {err}"));
                tracing::warn!(execution_id, error = %failure, "Transient overlay cleanup failed");
            }
        }
    }
}

struct PreparedRun {
    execution_id: ExecutionId,
    args: Vec<String>,
    suggested_name: String,
    artifacts: RunArtifacts,
}

enum RunEnd {
    Success,
    Cancelled,
    Failed(String),
}

struct Inner {
    engine: Arc<dyn MediaEngine>,
    storage: Arc<dyn StorageResolver>,
    callbacks: Arc<dyn RenderCallbacks>,
    temp: TempArtifactManager,
    settings: RenderSettings,
    shared: Mutex<Shared>,
}

/// Façade running one overlay render at a time.
///
/// `start` returns as soon as the engine has been handed the job; everything after
/// that reaches the caller through [`RenderCallbacks`].
pub struct RenderOrchestrator {
    inner: Arc<Inner>,
    runtime: Handle,
}

impl RenderOrchestrator {
    /// Create an orchestrator bound to the current tokio runtime.
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        storage: Arc<dyn StorageResolver>,
        callbacks: Arc<dyn RenderCallbacks>,
        settings: RenderSettings,
    ) -> VidmarkResult<Self> {
        let runtime = Handle::try_current().map_err(|_| {
            VidmarkError::config("RenderOrchestrator must be created inside a tokio runtime")
        })?;
        Ok(Self::with_runtime(engine, storage, callbacks, settings, runtime))
    }

    /// Create an orchestrator that supervises runs on `runtime`.
    pub fn with_runtime(
        engine: Arc<dyn MediaEngine>,
        storage: Arc<dyn StorageResolver>,
        callbacks: Arc<dyn RenderCallbacks>,
        settings: RenderSettings,
        runtime: Handle,
    ) -> Self {
        let temp = TempArtifactManager::new(settings.temp_dir.clone());
        Self {
            inner: Arc::new(Inner {
                engine,
                storage,
                callbacks,
                temp,
                settings,
                shared: Mutex::new(Shared {
                    state: RenderState::Idle,
                    current: None,
                    last_execution_id: 0,
                    engine_started: false,
                    cancel_requested: false,
                }),
            }),
            runtime,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RenderState {
        self.inner.lock().state
    }

    /// Execution id of the in-flight or most recent run.
    pub fn current_execution(&self) -> Option<ExecutionId> {
        self.inner.lock().current
    }

    /// Temp artifact bookkeeping (for diagnostics).
    pub fn temp_artifacts(&self) -> &TempArtifactManager {
        &self.inner.temp
    }

    /// Begin rendering `request`.
    ///
    /// Fails synchronously with `InvalidArgument` for an incomplete request,
    /// `AlreadyRunning` while another run is in flight, and with the underlying error
    /// if sources cannot be resolved or temp space allocated. In all these cases no
    /// callback fires. Once `Ok` is returned, exactly one terminal callback follows.
    pub fn start(&self, request: RenderRequest) -> VidmarkResult<ExecutionId> {
        request.validate()?;

        let (execution_id, previous) = {
            let mut shared = self.inner.lock();
            if shared.state.is_busy() {
                tracing::warn!(
                    current = ?shared.current,
                    "Rejecting render start while another run is in flight"
                );
                return Err(VidmarkError::AlreadyRunning);
            }
            let previous = (shared.state, shared.current);
            shared.last_execution_id += 1;
            shared.state = RenderState::Preparing;
            shared.current = Some(shared.last_execution_id);
            shared.engine_started = false;
            shared.cancel_requested = false;
            (shared.last_execution_id, previous)
        };

        tracing::info!(
            execution_id,
            position = %request.position,
            "Preparing render"
        );

        let run = match self.inner.prepare(execution_id, &request) {
            Ok(run) => run,
            Err(err) => {
                tracing::warn!(execution_id, error = %err, "Render preparation failed");
                let mut shared = self.inner.lock();
                shared.state = previous.0;
                shared.current = previous.1;
                return Err(err);
            }
        };

        self.inner.lock().state = RenderState::Running;
        self.inner.callbacks.show_loader();

        let inner = Arc::clone(&self.inner);
        self.runtime.spawn(async move { inner.supervise(run).await });

        Ok(execution_id)
    }

    /// Ask the running render to stop.
    ///
    /// Returns `false` unless a run is `Running`; a run still being prepared cannot
    /// be cancelled. Once accepted, the run ends through the normal terminal path
    /// when the engine confirms.
    pub fn cancel(&self) -> bool {
        let mut shared = self.inner.lock();
        let execution_id = match shared.current {
            Some(id) if shared.state == RenderState::Running => id,
            _ => return false,
        };
        if shared.cancel_requested {
            return true;
        }
        shared.cancel_requested = true;
        tracing::info!(execution_id, "Cancellation requested");
        if shared.engine_started {
            self.inner.engine.cancel(execution_id);
        }
        true
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn prepare(
        &self,
        execution_id: ExecutionId,
        request: &RenderRequest,
    ) -> VidmarkResult<PreparedRun> {
        let mut artifacts = RunArtifacts::default();
        match self.prepare_into(request, &mut artifacts) {
            Ok(args) => Ok(PreparedRun {
                execution_id,
                args,
                suggested_name: request
                    .output_naming_hint
                    .clone()
                    .unwrap_or_else(|| chrono::Utc::now().timestamp_millis().to_string()),
                artifacts,
            }),
            Err(err) => {
                artifacts.release(execution_id, &self.temp, self.storage.as_ref());
                Err(err)
            }
        }
    }

    fn prepare_into(
        &self,
        request: &RenderRequest,
        artifacts: &mut RunArtifacts,
    ) -> VidmarkResult<Vec<String>> {
        let video = match &request.source_video {
            MediaSource::Path(path) => path.clone(),
            MediaSource::Resource(handle) => self.storage.resolve_to_path(handle)?,
        };

        let overlay = match &request.overlay {
            OverlaySource::Path(path) => path.clone(),
            OverlaySource::Resource(handle) => self.storage.resolve_to_path(handle)?,
            OverlaySource::TransientResource(handle) => {
                let path = self.storage.resolve_to_path(handle)?;
                artifacts.transient_resource = Some(handle.clone());
                path
            }
            OverlaySource::View(view) => {
                let image = view.render()?;
                let artifact = self.temp.materialize(&image.bytes, &image.extension)?;
                let path = artifact.path().to_path_buf();
                artifacts.overlay_image = Some(artifact);
                path
            }
        };

        let output = self.temp.allocate(&self.settings.output_extension)?;
        let args = build_overlay_args(&video, &overlay, output.path(), request.position);
        artifacts.output = Some(output);
        args
    }

    async fn supervise(self: Arc<Self>, run: PreparedRun) {
        let PreparedRun {
            execution_id,
            args,
            suggested_name,
            artifacts,
        } = run;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = {
            let mut shared = self.lock();
            let started = self.engine.execute(execution_id, args, tx);
            if started.is_ok() {
                shared.engine_started = true;
                if shared.cancel_requested {
                    self.engine.cancel(execution_id);
                }
            }
            started
        };

        let end = match started {
            Err(err) => RunEnd::Failed(err.to_string()),
            Ok(()) => {
                tracing::info!(execution_id, engine = self.engine.name(), "Render running");
                let mut adapter = EngineEventAdapter::new(execution_id);
                let end = loop {
                    let Some(event) = rx.recv().await else {
                        break RunEnd::Failed(
                            "engine event stream closed without completion".to_string(),
                        );
                    };
                    match adapter.handle(event) {
                        Some(AdapterEvent::Log(log)) => {
                            tracing::debug!(execution_id, text = %log.text, "engine");
                            self.callbacks.on_log(log);
                        }
                        Some(AdapterEvent::Statistics(stats)) => self.callbacks.on_progress(stats),
                        Some(AdapterEvent::Success) => break RunEnd::Success,
                        Some(AdapterEvent::Cancel) => break RunEnd::Cancelled,
                        Some(AdapterEvent::Failure(reason)) => break RunEnd::Failed(reason),
                        None => {}
                    }
                };
                tracing::debug!(
                    execution_id,
                    last_frame = adapter.statistics().frame_number,
                    suppressed = adapter.suppressed(),
                    "Engine stream ended"
                );
                end
            }
        };
        drop(rx);

        self.finish(execution_id, end, artifacts, &suggested_name);
    }

    fn finish(
        &self,
        execution_id: ExecutionId,
        end: RunEnd,
        artifacts: RunArtifacts,
        suggested_name: &str,
    ) {
        let result = match end {
            RunEnd::Success => match artifacts.output.as_ref() {
                Some(output) => self
                    .storage
                    .persist(output.path(), suggested_name, &self.settings.mime_type)
                    .map_err(|err| match err {
                        VidmarkError::PersistFailure { .. } => err,
                        other => VidmarkError::persist(other.to_string()),
                    }),
                None => Err(VidmarkError::persist("no rendered output to persist")),
            },
            RunEnd::Cancelled => Err(VidmarkError::Cancelled),
            RunEnd::Failed(reason) => Err(VidmarkError::engine(reason)),
        };

        artifacts.release(execution_id, &self.temp, self.storage.as_ref());

        let state = match &result {
            Ok(_) => RenderState::Succeeded,
            Err(VidmarkError::Cancelled) => RenderState::Cancelled,
            Err(_) => RenderState::Failed,
        };
        self.callbacks.hide_loader();
        match result {
            Ok(handle) => {
                tracing::info!(execution_id, output = %handle, "Render succeeded");
                self.callbacks.on_success(handle);
            }
            Err(VidmarkError::Cancelled) => {
                tracing::info!(execution_id, "Render cancelled");
                self.callbacks.on_cancel();
            }
            Err(err) => {
                tracing::error!(execution_id, error = %err, "Render failed");
                self.callbacks.on_failure();
            }
        }

        // Terminal state becomes visible only after the terminal callback.
        let mut shared = self.lock();
        if shared.current == Some(execution_id) {
            shared.state = state;
        }
    }
}
