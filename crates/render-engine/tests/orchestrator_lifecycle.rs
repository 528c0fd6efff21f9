use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedReceiver;

use vidmark_common::error::{VidmarkError, VidmarkResult};
use vidmark_overlay_model::{
    DurableArtifactHandle, ExecutionId, ExecutionLog, MediaSource, OverlayPosition,
    OverlaySource, OverlayView, ProgressStatistics, RenderRequest, RenderedImage, ResourceHandle,
    StaticImageView,
};
use vidmark_render_engine::{
    ChannelCallbacks, EngineEvent, EngineEventSender, EngineOutcome, FfmpegEngine, MediaEngine,
    RenderCallbacks, RenderEvent, RenderOrchestrator, RenderSettings, RenderState,
    StorageResolver,
};

/// Engine double driven step by step from the test.
#[derive(Default)]
struct ManualEngine {
    sender: Mutex<Option<(ExecutionId, EngineEventSender)>>,
    executions: Mutex<Vec<(ExecutionId, Vec<String>)>>,
    cancels: Mutex<Vec<ExecutionId>>,
    fail_to_start: bool,
    complete_on_cancel: bool,
}

impl ManualEngine {
    fn cancelling() -> Self {
        Self {
            complete_on_cancel: true,
            ..Self::default()
        }
    }

    fn broken() -> Self {
        Self {
            fail_to_start: true,
            ..Self::default()
        }
    }

    async fn wait_for_execution(&self) -> ExecutionId {
        for _ in 0..500 {
            if let Some((id, _)) = self.sender.lock().unwrap().as_ref() {
                return *id;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("engine was never executed");
    }

    fn emit(&self, event: EngineEvent) {
        if let Some((_, tx)) = self.sender.lock().unwrap().as_ref() {
            let _ = tx.send(event);
        }
    }

    fn complete(&self, execution_id: ExecutionId, outcome: EngineOutcome) {
        self.emit(EngineEvent::Completed {
            execution_id,
            outcome,
        });
    }

    fn hang_up(&self) {
        self.sender.lock().unwrap().take();
    }

    fn args(&self) -> Vec<String> {
        self.executions.lock().unwrap().last().unwrap().1.clone()
    }

    fn execution_count(&self) -> usize {
        self.executions.lock().unwrap().len()
    }

    fn cancel_count(&self) -> usize {
        self.cancels.lock().unwrap().len()
    }
}

impl MediaEngine for ManualEngine {
    fn execute(
        &self,
        execution_id: ExecutionId,
        args: Vec<String>,
        events: EngineEventSender,
    ) -> VidmarkResult<()> {
        if self.fail_to_start {
            return Err(VidmarkError::engine("engine binary missing"));
        }
        self.executions.lock().unwrap().push((execution_id, args));
        *self.sender.lock().unwrap() = Some((execution_id, events));
        Ok(())
    }

    fn cancel(&self, execution_id: ExecutionId) {
        self.cancels.lock().unwrap().push(execution_id);
        if self.complete_on_cancel {
            self.complete(execution_id, EngineOutcome::Cancelled);
        }
    }

    fn is_available(&self) -> bool {
        true
    }

    fn name(&self) -> &str {
        "manual"
    }
}

/// In-memory storage recording every call.
#[derive(Default)]
struct MemoryStorage {
    resources: HashMap<String, PathBuf>,
    fail_persist: bool,
    persisted: Mutex<Vec<(PathBuf, String, String)>>,
    deleted: Mutex<Vec<ResourceHandle>>,
}

impl StorageResolver for MemoryStorage {
    fn resolve_to_path(&self, handle: &ResourceHandle) -> VidmarkResult<PathBuf> {
        self.resources
            .get(handle.as_str())
            .cloned()
            .ok_or_else(|| VidmarkError::not_found(handle.as_str()))
    }

    fn persist(
        &self,
        temp_file: &Path,
        suggested_name: &str,
        mime_type: &str,
    ) -> VidmarkResult<DurableArtifactHandle> {
        assert!(temp_file.exists(), "temp output must exist while persisting");
        self.persisted.lock().unwrap().push((
            temp_file.to_path_buf(),
            suggested_name.to_string(),
            mime_type.to_string(),
        ));
        if self.fail_persist {
            return Err(VidmarkError::persist("media store rejected insert"));
        }
        Ok(DurableArtifactHandle::new(format!("mem://{suggested_name}")))
    }

    fn delete(&self, handle: &ResourceHandle) -> VidmarkResult<()> {
        self.deleted.lock().unwrap().push(handle.clone());
        Ok(())
    }
}

struct Harness {
    dir: PathBuf,
    engine: Arc<ManualEngine>,
    storage: Arc<MemoryStorage>,
    orchestrator: Arc<RenderOrchestrator>,
    events: UnboundedReceiver<RenderEvent>,
}

impl Harness {
    fn new(name: &str, engine: ManualEngine, storage: MemoryStorage) -> Self {
        let dir = std::env::temp_dir().join(format!("vidmark_test_orch_{name}"));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("a.mp4"), b"video").unwrap();
        std::fs::write(dir.join("b.jpg"), b"image").unwrap();

        let engine = Arc::new(engine);
        let storage = Arc::new(storage);
        let (callbacks, events) = ChannelCallbacks::new();
        let settings = RenderSettings {
            temp_dir: dir.join("tmp"),
            ..RenderSettings::default()
        };
        let orchestrator = Arc::new(
            RenderOrchestrator::new(
                engine.clone(),
                storage.clone(),
                Arc::new(callbacks),
                settings,
            )
            .unwrap(),
        );

        Self {
            dir,
            engine,
            storage,
            orchestrator,
            events,
        }
    }

    fn request(&self, position: OverlayPosition) -> RenderRequest {
        RenderRequest::builder()
            .source_video_path(self.dir.join("a.mp4"))
            .overlay_image_path(self.dir.join("b.jpg"))
            .position(position)
            .build()
            .unwrap()
    }

    async fn drain_until_terminal(&mut self) -> Vec<RenderEvent> {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
                .await
                .expect("timed out waiting for render events")
                .expect("callback channel closed");
            let terminal = event.is_terminal();
            seen.push(event);
            if terminal {
                return seen;
            }
        }
    }

    fn temp_files(&self) -> usize {
        std::fs::read_dir(self.dir.join("tmp"))
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.dir).ok();
    }
}

fn count(events: &[RenderEvent], wanted: &RenderEvent) -> usize {
    events.iter().filter(|event| *event == wanted).count()
}

#[tokio::test]
async fn bottom_center_render_merges_progress_and_persists() {
    let mut h = Harness::new("success", ManualEngine::default(), MemoryStorage::default());

    let execution_id = h
        .orchestrator
        .start(h.request(OverlayPosition::BottomCenter))
        .unwrap();
    assert_eq!(h.orchestrator.state(), RenderState::Running);
    assert_eq!(h.engine.wait_for_execution().await, execution_id);

    let args = h.engine.args();
    assert_eq!(args[1], h.dir.join("a.mp4").to_string_lossy());
    assert_eq!(args[3], h.dir.join("b.jpg").to_string_lossy());
    assert_eq!(args[5], "overlay=x=(W-w)/2:y=H-h-5");
    let temp_output = PathBuf::from(args.last().unwrap());
    assert!(temp_output.exists());
    assert_eq!(temp_output.extension().unwrap(), "mp4");

    h.engine.emit(EngineEvent::Statistics(ProgressStatistics {
        execution_id,
        frame_number: 10,
        fps: 0.0,
        ..Default::default()
    }));
    h.engine.emit(EngineEvent::Statistics(ProgressStatistics {
        execution_id,
        frame_number: 0,
        fps: 29.97,
        ..Default::default()
    }));
    h.engine.complete(execution_id, EngineOutcome::Success);

    let events = h.drain_until_terminal().await;
    assert_eq!(events.first(), Some(&RenderEvent::ShowLoader));

    let last_progress = events
        .iter()
        .filter_map(|event| match event {
            RenderEvent::Progress(stats) => Some(*stats),
            _ => None,
        })
        .last()
        .unwrap();
    assert_eq!(last_progress.frame_number, 10);
    assert!((last_progress.fps - 29.97).abs() < 1e-6);

    assert_eq!(count(&events, &RenderEvent::HideLoader), 1);
    let successes: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, RenderEvent::Success { .. }))
        .collect();
    assert_eq!(successes.len(), 1);
    assert_eq!(events[events.len() - 2], RenderEvent::HideLoader);

    let persisted = h.storage.persisted.lock().unwrap().clone();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].0, temp_output);
    assert_eq!(persisted[0].2, "video/mp4");
    assert_eq!(
        events.last(),
        Some(&RenderEvent::Success {
            output: DurableArtifactHandle::new(format!("mem://{}", persisted[0].1)),
        })
    );

    assert!(!temp_output.exists());
    assert_eq!(h.orchestrator.temp_artifacts().outstanding(), 0);
    assert_eq!(h.temp_files(), 0);
    assert_eq!(h.orchestrator.state(), RenderState::Succeeded);
}

#[tokio::test]
async fn view_overlay_is_materialized_and_removed() {
    let mut h = Harness::new("view", ManualEngine::default(), MemoryStorage::default());

    let request = RenderRequest::builder()
        .source_video_path(h.dir.join("a.mp4"))
        .overlay_view(Arc::new(StaticImageView::new(b"webp-bytes".to_vec(), "webp")))
        .position(OverlayPosition::TopRight)
        .output_naming_hint("with-sticker")
        .build()
        .unwrap();
    let execution_id = h.orchestrator.start(request).unwrap();
    h.engine.wait_for_execution().await;

    let args = h.engine.args();
    let overlay_image = PathBuf::from(&args[3]);
    assert_eq!(std::fs::read(&overlay_image).unwrap(), b"webp-bytes");
    assert_eq!(overlay_image.extension().unwrap(), "webp");
    assert_eq!(h.orchestrator.temp_artifacts().outstanding(), 2);

    h.engine.complete(execution_id, EngineOutcome::Success);
    let events = h.drain_until_terminal().await;

    assert_eq!(
        events.last(),
        Some(&RenderEvent::Success {
            output: DurableArtifactHandle::new("mem://with-sticker"),
        })
    );
    assert!(!overlay_image.exists());
    assert_eq!(h.orchestrator.temp_artifacts().outstanding(), 0);
}

#[tokio::test]
async fn empty_paths_fail_synchronously_without_state_change() {
    let mut h = Harness::new("invalid", ManualEngine::default(), MemoryStorage::default());

    let empty_video = RenderRequest {
        source_video: MediaSource::Path(PathBuf::new()),
        overlay: OverlaySource::Path(h.dir.join("b.jpg")),
        position: OverlayPosition::Center,
        output_naming_hint: None,
    };
    let err = h.orchestrator.start(empty_video).unwrap_err();
    assert!(matches!(err, VidmarkError::InvalidArgument { .. }));

    let empty_overlay = RenderRequest {
        source_video: MediaSource::Path(h.dir.join("a.mp4")),
        overlay: OverlaySource::Path(PathBuf::new()),
        position: OverlayPosition::Center,
        output_naming_hint: None,
    };
    let err = h.orchestrator.start(empty_overlay).unwrap_err();
    assert!(matches!(err, VidmarkError::InvalidArgument { .. }));

    assert_eq!(h.orchestrator.state(), RenderState::Idle);
    assert_eq!(h.orchestrator.current_execution(), None);
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.engine.execution_count(), 0);
    assert_eq!(h.temp_files(), 0);
}

#[tokio::test]
async fn unresolvable_handle_fails_before_running() {
    let mut h = Harness::new("unresolved", ManualEngine::default(), MemoryStorage::default());

    let request = RenderRequest::builder()
        .source_video_resource(ResourceHandle::new("content://media/video/42"))
        .overlay_image_path(h.dir.join("b.jpg"))
        .build()
        .unwrap();
    let err = h.orchestrator.start(request).unwrap_err();

    assert!(matches!(err, VidmarkError::NotFound { .. }));
    assert_eq!(h.orchestrator.state(), RenderState::Idle);
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.orchestrator.temp_artifacts().outstanding(), 0);
}

#[tokio::test]
async fn second_start_while_running_is_rejected() {
    let mut h = Harness::new("busy", ManualEngine::default(), MemoryStorage::default());

    let first = h
        .orchestrator
        .start(h.request(OverlayPosition::TopLeft))
        .unwrap();
    h.engine.wait_for_execution().await;

    let err = h
        .orchestrator
        .start(h.request(OverlayPosition::Center))
        .unwrap_err();
    assert!(matches!(err, VidmarkError::AlreadyRunning));
    assert_eq!(h.orchestrator.state(), RenderState::Running);
    assert_eq!(h.orchestrator.current_execution(), Some(first));
    assert_eq!(h.engine.execution_count(), 1);

    h.engine.complete(first, EngineOutcome::Success);
    let events = h.drain_until_terminal().await;
    assert!(matches!(events.last(), Some(RenderEvent::Success { .. })));
    assert_eq!(count(&events, &RenderEvent::ShowLoader), 1);

    // A finished orchestrator accepts the next run.
    let second = h
        .orchestrator
        .start(h.request(OverlayPosition::Center))
        .unwrap();
    assert_eq!(second, first + 1);
}

#[tokio::test]
async fn engine_failure_cleans_up_and_reports_failure() {
    let mut h = Harness::new("failure", ManualEngine::default(), MemoryStorage::default());

    let execution_id = h
        .orchestrator
        .start(h.request(OverlayPosition::BottomLeft))
        .unwrap();
    h.engine.wait_for_execution().await;
    let temp_output = PathBuf::from(h.engine.args().last().unwrap());

    h.engine.emit(EngineEvent::Log {
        execution_id,
        text: "Invalid data found when processing input".to_string(),
    });
    h.engine.complete(
        execution_id,
        EngineOutcome::Failed {
            reason: "exit status 1".to_string(),
        },
    );

    let events = h.drain_until_terminal().await;
    assert_eq!(
        &events[events.len() - 2..],
        &[RenderEvent::HideLoader, RenderEvent::Failure]
    );
    assert!(events.iter().any(|event| matches!(event, RenderEvent::Log(_))));
    assert!(h.storage.persisted.lock().unwrap().is_empty());
    assert!(!temp_output.exists());
    assert_eq!(h.orchestrator.state(), RenderState::Failed);
}

#[tokio::test]
async fn cancel_goes_through_engine_and_cleans_up() {
    let mut h = Harness::new("cancel", ManualEngine::cancelling(), MemoryStorage::default());

    assert!(!h.orchestrator.cancel());

    h.orchestrator
        .start(h.request(OverlayPosition::BottomRight))
        .unwrap();
    h.engine.wait_for_execution().await;
    let temp_output = PathBuf::from(h.engine.args().last().unwrap());

    assert!(h.orchestrator.cancel());
    assert!(h.orchestrator.cancel());

    let events = h.drain_until_terminal().await;
    assert_eq!(
        &events[events.len() - 2..],
        &[RenderEvent::HideLoader, RenderEvent::Cancelled]
    );
    assert_eq!(h.engine.cancel_count(), 1);
    assert!(!temp_output.exists());
    assert_eq!(h.orchestrator.state(), RenderState::Cancelled);
    assert!(!h.orchestrator.cancel());
}

#[tokio::test]
async fn persist_failure_is_a_failed_run() {
    let storage = MemoryStorage {
        fail_persist: true,
        ..MemoryStorage::default()
    };
    let mut h = Harness::new("persist_failure", ManualEngine::default(), storage);

    let execution_id = h
        .orchestrator
        .start(h.request(OverlayPosition::Center))
        .unwrap();
    h.engine.wait_for_execution().await;
    let temp_output = PathBuf::from(h.engine.args().last().unwrap());
    h.engine.complete(execution_id, EngineOutcome::Success);

    let events = h.drain_until_terminal().await;
    assert_eq!(events.last(), Some(&RenderEvent::Failure));
    assert_eq!(count(&events, &RenderEvent::HideLoader), 1);
    assert_eq!(h.storage.persisted.lock().unwrap().len(), 1);
    assert!(!temp_output.exists());
    assert_eq!(h.orchestrator.state(), RenderState::Failed);
}

#[tokio::test]
async fn transient_overlay_resource_is_deleted_on_every_outcome() {
    let mut storage = MemoryStorage::default();
    storage.resources.insert(
        "content://media/images/7".to_string(),
        std::env::temp_dir().join("vidmark_test_orch_transient/b.jpg"),
    );
    let mut h = Harness::new("transient", ManualEngine::default(), storage);

    let request = RenderRequest::builder()
        .source_video_path(h.dir.join("a.mp4"))
        .overlay_source(OverlaySource::TransientResource(ResourceHandle::new(
            "content://media/images/7",
        )))
        .build()
        .unwrap();
    let execution_id = h.orchestrator.start(request).unwrap();
    h.engine.wait_for_execution().await;
    assert_eq!(h.engine.args()[3], h.dir.join("b.jpg").to_string_lossy());

    h.engine.complete(
        execution_id,
        EngineOutcome::Failed {
            reason: "killed".to_string(),
        },
    );
    h.drain_until_terminal().await;

    let deleted = h.storage.deleted.lock().unwrap().clone();
    assert_eq!(deleted, vec![ResourceHandle::new("content://media/images/7")]);
}

#[tokio::test]
async fn events_after_termination_are_not_delivered() {
    let mut h = Harness::new("late", ManualEngine::default(), MemoryStorage::default());

    let execution_id = h
        .orchestrator
        .start(h.request(OverlayPosition::TopLeft))
        .unwrap();
    h.engine.wait_for_execution().await;

    h.engine.complete(execution_id, EngineOutcome::Success);
    h.engine.complete(execution_id, EngineOutcome::Cancelled);
    h.engine.emit(EngineEvent::Log {
        execution_id,
        text: "late line".to_string(),
    });

    let events = h.drain_until_terminal().await;
    assert!(matches!(events.last(), Some(RenderEvent::Success { .. })));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.orchestrator.state(), RenderState::Succeeded);
}

#[tokio::test]
async fn engine_that_never_starts_reports_failure() {
    let mut h = Harness::new("broken", ManualEngine::broken(), MemoryStorage::default());

    h.orchestrator
        .start(h.request(OverlayPosition::Center))
        .unwrap();
    let events = h.drain_until_terminal().await;

    assert_eq!(
        events,
        vec![
            RenderEvent::ShowLoader,
            RenderEvent::HideLoader,
            RenderEvent::Failure
        ]
    );
    assert_eq!(h.orchestrator.temp_artifacts().outstanding(), 0);
    assert_eq!(h.temp_files(), 0);
}

#[tokio::test]
async fn engine_hang_up_without_completion_is_failure() {
    let mut h = Harness::new("hangup", ManualEngine::default(), MemoryStorage::default());

    h.orchestrator
        .start(h.request(OverlayPosition::Center))
        .unwrap();
    h.engine.wait_for_execution().await;
    h.engine.hang_up();

    let events = h.drain_until_terminal().await;
    assert_eq!(events.last(), Some(&RenderEvent::Failure));
    assert_eq!(h.orchestrator.state(), RenderState::Failed);
}

#[tokio::test]
async fn missing_ffmpeg_binary_fails_the_run() {
    let dir = std::env::temp_dir().join("vidmark_test_orch_ffmpeg_missing");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let (callbacks, mut events) = ChannelCallbacks::new();
    let orchestrator = RenderOrchestrator::new(
        Arc::new(FfmpegEngine::new("vidmark-no-such-ffmpeg")),
        Arc::new(MemoryStorage::default()),
        Arc::new(callbacks),
        RenderSettings {
            temp_dir: dir.join("tmp"),
            ..RenderSettings::default()
        },
    )
    .unwrap();

    let request = RenderRequest::builder()
        .source_video_path(dir.join("a.mp4"))
        .overlay_image_path(dir.join("b.jpg"))
        .build()
        .unwrap();
    orchestrator.start(request).unwrap();

    let mut seen = Vec::new();
    while let Ok(Some(event)) =
        tokio::time::timeout(Duration::from_secs(5), events.recv()).await
    {
        let terminal = event.is_terminal();
        seen.push(event);
        if terminal {
            break;
        }
    }
    assert_eq!(seen.last(), Some(&RenderEvent::Failure));
    assert_eq!(orchestrator.temp_artifacts().outstanding(), 0);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn cancel_before_engine_start_is_replayed_once() {
    let mut h = Harness::new("early_cancel", ManualEngine::cancelling(), MemoryStorage::default());

    h.orchestrator
        .start(h.request(OverlayPosition::TopRight))
        .unwrap();
    // The supervisor has not run yet on this single-threaded runtime.
    assert_eq!(h.engine.execution_count(), 0);
    assert!(h.orchestrator.cancel());
    assert!(h.orchestrator.cancel());

    let events = h.drain_until_terminal().await;
    assert_eq!(
        events,
        vec![
            RenderEvent::ShowLoader,
            RenderEvent::HideLoader,
            RenderEvent::Cancelled
        ]
    );
    assert_eq!(h.engine.execution_count(), 1);
    assert_eq!(h.engine.cancel_count(), 1);
    assert_eq!(h.orchestrator.temp_artifacts().outstanding(), 0);
    assert_eq!(h.orchestrator.state(), RenderState::Cancelled);
}

/// Overlay view that tries to cancel the run it is being prepared for, then fails.
struct CancellingView {
    orchestrator: OnceLock<Weak<RenderOrchestrator>>,
    seen: Mutex<Option<(RenderState, bool)>>,
}

impl OverlayView for CancellingView {
    fn render(&self) -> VidmarkResult<RenderedImage> {
        let orchestrator = self
            .orchestrator
            .get()
            .and_then(Weak::upgrade)
            .expect("orchestrator registered");
        let state = orchestrator.state();
        let accepted = orchestrator.cancel();
        *self.seen.lock().unwrap() = Some((state, accepted));
        Err(VidmarkError::invalid_argument("view has nothing to draw"))
    }
}

#[tokio::test]
async fn cancel_while_preparing_is_refused() {
    let mut h = Harness::new("prepare_cancel", ManualEngine::default(), MemoryStorage::default());

    let view = Arc::new(CancellingView {
        orchestrator: OnceLock::new(),
        seen: Mutex::new(None),
    });
    view.orchestrator
        .set(Arc::downgrade(&h.orchestrator))
        .unwrap();

    let request = RenderRequest::builder()
        .source_video_path(h.dir.join("a.mp4"))
        .overlay_view(view.clone())
        .build()
        .unwrap();
    let err = h.orchestrator.start(request).unwrap_err();

    assert!(matches!(err, VidmarkError::InvalidArgument { .. }));
    assert_eq!(*view.seen.lock().unwrap(), Some((RenderState::Preparing, false)));
    assert_eq!(h.orchestrator.state(), RenderState::Idle);
    assert!(h.events.try_recv().is_err());
    assert_eq!(h.engine.execution_count(), 0);
}

/// Records the orchestrator state observed from inside each callback.
#[derive(Default)]
struct StateRecordingCallbacks {
    orchestrator: OnceLock<Weak<RenderOrchestrator>>,
    next_request: Mutex<Option<RenderRequest>>,
    seen: Mutex<Vec<(&'static str, RenderState)>>,
    restart: Mutex<Option<VidmarkResult<ExecutionId>>>,
    done: tokio::sync::Notify,
}

impl StateRecordingCallbacks {
    fn record(&self, name: &'static str) {
        if let Some(orchestrator) = self.orchestrator.get().and_then(Weak::upgrade) {
            self.seen.lock().unwrap().push((name, orchestrator.state()));
        }
    }
}

impl RenderCallbacks for StateRecordingCallbacks {
    fn show_loader(&self) {
        self.record("show_loader");
    }

    fn hide_loader(&self) {
        self.record("hide_loader");
    }

    fn on_progress(&self, _statistics: ProgressStatistics) {}

    fn on_log(&self, _log: ExecutionLog) {}

    fn on_success(&self, _output: DurableArtifactHandle) {
        self.record("success");
        let orchestrator = self.orchestrator.get().and_then(Weak::upgrade);
        let request = self.next_request.lock().unwrap().take();
        if let (Some(orchestrator), Some(request)) = (orchestrator, request) {
            *self.restart.lock().unwrap() = Some(orchestrator.start(request));
        }
        self.done.notify_one();
    }

    fn on_failure(&self) {
        self.record("failure");
        self.done.notify_one();
    }
}

#[tokio::test]
async fn terminal_state_is_published_after_callbacks() {
    let dir = std::env::temp_dir().join("vidmark_test_orch_publish_order");
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let engine = Arc::new(ManualEngine::default());
    let callbacks = Arc::new(StateRecordingCallbacks::default());
    let orchestrator = Arc::new(
        RenderOrchestrator::new(
            engine.clone(),
            Arc::new(MemoryStorage::default()),
            callbacks.clone(),
            RenderSettings {
                temp_dir: dir.join("tmp"),
                ..RenderSettings::default()
            },
        )
        .unwrap(),
    );
    callbacks
        .orchestrator
        .set(Arc::downgrade(&orchestrator))
        .unwrap();

    let request = || {
        RenderRequest::builder()
            .source_video_path(dir.join("a.mp4"))
            .overlay_image_path(dir.join("b.jpg"))
            .build()
            .unwrap()
    };
    *callbacks.next_request.lock().unwrap() = Some(request());

    let execution_id = orchestrator.start(request()).unwrap();
    engine.wait_for_execution().await;
    engine.complete(execution_id, EngineOutcome::Success);

    tokio::time::timeout(Duration::from_secs(5), callbacks.done.notified())
        .await
        .expect("timed out waiting for the terminal callback");

    assert_eq!(
        *callbacks.seen.lock().unwrap(),
        vec![
            ("show_loader", RenderState::Running),
            ("hide_loader", RenderState::Running),
            ("success", RenderState::Running),
        ]
    );
    assert!(matches!(
        callbacks.restart.lock().unwrap().take(),
        Some(Err(VidmarkError::AlreadyRunning))
    ));
    assert_eq!(orchestrator.state(), RenderState::Succeeded);
    assert_eq!(engine.execution_count(), 1);

    std::fs::remove_dir_all(&dir).ok();
}
