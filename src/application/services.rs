use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::{
    application::{
        detection_loop::{DetectionLoop, LoopChannels},
        ports::{
            CameraCatalogPort, DetectorLoader, FrameRenderer, FrameSourcePort, FrameStream, ModelCatalogPort,
        },
        worker::DetectionWorker,
    },
    domain::{
        camera::{CameraId, CameraInfo, CameraMode, FrameSize, PixelFormat},
        counts::ObjectCounts,
        errors::{DomainError, DomainResult},
        geometry::Roi,
        model::InferenceConfig,
        session::{LoopState, Session},
        settings::Settings,
        stream::{Notice, SessionStatus, StreamEvent},
        tracker::DedupStrategy,
    },
};

/// Camera inventory for the dashboard.
#[derive(Clone)]
pub struct CameraService {
    catalog: Arc<dyn CameraCatalogPort>,
}

impl CameraService {
    pub fn new(catalog: Arc<dyn CameraCatalogPort>) -> Self {
        Self { catalog }
    }

    pub async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        self.catalog.list_cameras().await
    }

    pub async fn list_formats(&self, camera: CameraId) -> DomainResult<Vec<PixelFormat>> {
        self.catalog.list_formats(&camera).await
    }

    pub async fn list_frame_sizes(&self, camera: CameraId, fourcc: String) -> DomainResult<Vec<FrameSize>> {
        self.catalog.list_frame_sizes(&camera, &fourcc).await
    }
}

/// What a session uses when the start request does not say otherwise.
#[derive(Debug, Clone)]
pub struct SessionDefaults {
    pub camera: CameraId,
    pub mode: CameraMode,
    pub inference: InferenceConfig,
    pub roi: Roi,
    pub dedup: DedupStrategy,
}

/// Per-request overrides for [`SessionService::start`].
#[derive(Debug, Clone, Default)]
pub struct StartSession {
    pub camera: Option<CameraId>,
    pub mode: Option<CameraMode>,
    pub onnx_path: Option<String>,
}

struct ActiveSession {
    stop: watch::Sender<bool>,
    handle: JoinHandle<Session>,
}

/// Starts and stops the detection loop and exposes its state.
pub struct SessionService {
    frame_source: Arc<dyn FrameSourcePort>,
    detector_loader: Arc<dyn DetectorLoader>,
    model_catalog: Arc<dyn ModelCatalogPort>,
    renderer: Arc<dyn FrameRenderer>,
    defaults: SessionDefaults,
    events: broadcast::Sender<StreamEvent>,
    status: Arc<watch::Sender<SessionStatus>>,
    roi: watch::Sender<Roi>,
    active: Mutex<Option<ActiveSession>>,
}

impl SessionService {
    pub fn new(
        frame_source: Arc<dyn FrameSourcePort>,
        detector_loader: Arc<dyn DetectorLoader>,
        model_catalog: Arc<dyn ModelCatalogPort>,
        renderer: Arc<dyn FrameRenderer>,
        defaults: SessionDefaults,
    ) -> Self {
        let (events, _) = broadcast::channel(32);
        let (status, _) = watch::channel(SessionStatus::default());
        let (roi, _) = watch::channel(defaults.roi);
        Self {
            frame_source,
            detector_loader,
            model_catalog,
            renderer,
            defaults,
            events,
            status: Arc::new(status),
            roi,
            active: Mutex::new(None),
        }
    }

    pub fn defaults(&self) -> &SessionDefaults {
        &self.defaults
    }

    /// Sender shared with other services that publish notices.
    pub fn events(&self) -> broadcast::Sender<StreamEvent> {
        self.events.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Counts of the running session, or of the last one once it stopped.
    pub fn counts(&self) -> ObjectCounts {
        self.status.borrow().counts.clone()
    }

    pub fn roi(&self) -> Roi {
        *self.roi.borrow()
    }

    /// Takes effect on the next frame of the running session, and for later sessions.
    pub fn set_roi(&self, roi: Roi) -> DomainResult<()> {
        if !roi.is_valid() {
            return Err(DomainError::InvalidInput(format!("roi must have a positive size: {roi:?}")));
        }
        self.roi.send_replace(roi);
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|a| !a.handle.is_finished())
    }

    /// Open the camera, load the model, then spawn the loop.
    /// Any failure here is fatal and nothing is left running.
    pub async fn start(&self, request: StartSession) -> DomainResult<()> {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|a| !a.handle.is_finished()) {
            return Err(DomainError::Conflict("a session is already running".into()));
        }
        if let Some(finished) = active.take() {
            let _ = finished.handle.await;
        }

        let camera = request.camera.unwrap_or_else(|| self.defaults.camera.clone());
        let mode = request.mode.unwrap_or_else(|| self.defaults.mode.clone());
        let mut inference = self.defaults.inference.clone();
        if let Some(path) = request.onnx_path {
            inference.model.onnx_path = path;
        }

        let result = self.open(camera, mode, inference).await;
        let (frames, worker) = match result {
            Ok(parts) => parts,
            Err(e) => {
                error!("Session failed to start: {e}");
                self.notify(Notice::error(e.to_string()));
                return Err(e);
            }
        };

        let mut session = Session::new(self.roi(), self.defaults.dedup);
        session.transition(LoopState::Streaming)?;
        self.status.send_replace(SessionStatus {
            state: session.state(),
            ..SessionStatus::default()
        });

        let (stop_tx, stop_rx) = watch::channel(false);
        let channels = LoopChannels {
            events: self.events.clone(),
            status: self.status.clone(),
            roi: self.roi.subscribe(),
            stop: stop_rx,
        };
        let detection_loop = DetectionLoop::new(session, frames, worker, self.renderer.clone(), channels);
        let handle = tokio::spawn(detection_loop.run());

        *active = Some(ActiveSession { stop: stop_tx, handle });
        info!("Session started");
        Ok(())
    }

    async fn open(
        &self,
        camera: CameraId,
        mode: CameraMode,
        inference: InferenceConfig,
    ) -> DomainResult<(FrameStream, DetectionWorker)> {
        self.model_catalog
            .validate_model(&inference.model)
            .await
            .map_err(|err| match err {
                e @ DomainError::ModelLoad(_) => e,
                other => DomainError::ModelLoad(other.to_string()),
            })?;

        let source = self.frame_source.clone();
        let camera_path = camera.path.clone();
        let frames = tokio::task::spawn_blocking(move || source.start(&camera, &mode))
            .await
            .map_err(|e| DomainError::OperationFailed(format!("camera open task failed: {e}")))??;
        info!(camera = %camera_path, "Camera acquired");

        let mut worker = DetectionWorker::spawn(self.detector_loader.clone(), inference)?;
        if let Err(e) = worker.load_model().await {
            worker.shutdown().await;
            drop(frames);
            return Err(e);
        }
        Ok((frames, worker))
    }

    /// Stop the running session and return its final counts.
    pub async fn stop(&self) -> DomainResult<ObjectCounts> {
        let active = self
            .active
            .lock()
            .await
            .take()
            .ok_or_else(|| DomainError::Conflict("no session is running".into()))?;

        let _ = active.stop.send(true);
        let session = active
            .handle
            .await
            .map_err(|e| DomainError::OperationFailed(format!("detection loop failed: {e}")))?;
        info!(total = session.counts().total(), "Session stopped");
        Ok(session.counts().clone())
    }

    fn notify(&self, notice: Notice) {
        let _ = self.events.send(StreamEvent::Notice(notice));
    }
}

/// In-memory settings page state.
pub struct SettingsService {
    settings: RwLock<Settings>,
    events: broadcast::Sender<StreamEvent>,
}

impl SettingsService {
    pub fn new(settings: Settings, events: broadcast::Sender<StreamEvent>) -> Self {
        Self { settings: RwLock::new(settings), events }
    }

    pub fn get(&self) -> DomainResult<Settings> {
        self.settings
            .read()
            .map(|s| s.clone())
            .map_err(|_| DomainError::OperationFailed("settings lock poisoned".into()))
    }

    pub fn toggle(&self, name: &str) -> DomainResult<bool> {
        let mut settings = self
            .settings
            .write()
            .map_err(|_| DomainError::OperationFailed("settings lock poisoned".into()))?;
        let value = settings.toggle(name)?;
        info!(toggle = name, value, "Setting changed");
        Ok(value)
    }

    pub fn select_folder(&self, folder: PathBuf) -> DomainResult<()> {
        let mut settings = self
            .settings
            .write()
            .map_err(|_| DomainError::OperationFailed("settings lock poisoned".into()))?;
        settings.select_folder(folder.clone())?;
        info!(folder = %folder.display(), "Folder selected");

        let name = folder.file_name().unwrap_or(folder.as_os_str()).to_string_lossy();
        let _ = self
            .events
            .send(StreamEvent::Notice(Notice::success(format!("Selected folder: {name}"))));
        Ok(())
    }
}
