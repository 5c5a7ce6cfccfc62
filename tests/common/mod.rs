#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use tokio::sync::{broadcast, mpsc};

use waste_sorter::application::ports::{
    CameraCatalogPort, Detector, DetectorLoader, FrameRenderer, FrameSourcePort, FrameStream, ModelCatalogPort,
};
use waste_sorter::application::services::SessionDefaults;
use waste_sorter::domain::{
    camera::{CameraId, CameraInfo, CameraMode, FrameSize, PixelFormat},
    detection::{Detection, Prediction},
    errors::{DomainError, DomainResult},
    frame::Frame,
    geometry::{BBox, Roi},
    model::{DetectOptions, InferenceConfig, ModelId},
    stream::{CycleReport, FrameMeta, Notice, StreamEvent},
    tracker::DedupStrategy,
};

pub const WAIT: Duration = Duration::from_secs(5);

pub fn frame(seq: u64) -> Frame {
    Frame::new(seq, RgbImage::new(640, 480))
}

pub fn bottle(x: f32, y: f32) -> Prediction {
    Prediction::new("bottle", 0.9, BBox::new(x, y, 20.0, 20.0))
}

pub fn inference_config() -> InferenceConfig {
    InferenceConfig {
        model: ModelId { name: "scripted".into(), onnx_path: "scripted.onnx".into() },
        input_size: 640,
        iou_threshold: 0.45,
        intra_threads: 1,
        labels: vec!["bottle".into(), "can".into(), "person".into()],
        options: DetectOptions::default(),
    }
}

pub fn session_defaults(roi: Roi) -> SessionDefaults {
    SessionDefaults {
        camera: CameraId::from_index(0),
        mode: CameraMode {
            format: "MJPG".into(),
            size: FrameSize { width: 640, height: 480 },
            fps: 30,
        },
        inference: inference_config(),
        roi,
        dedup: DedupStrategy::ExactMatch,
    }
}

/// Camera fed by the test through the returned sender.
pub struct ScriptedFrameSource {
    frames: Mutex<Option<mpsc::Receiver<Frame>>>,
    pub released: Arc<AtomicBool>,
}

impl ScriptedFrameSource {
    pub fn new() -> (Arc<Self>, mpsc::Sender<Frame>) {
        let (tx, rx) = mpsc::channel(4);
        let source = Self { frames: Mutex::new(Some(rx)), released: Arc::new(AtomicBool::new(false)) };
        (Arc::new(source), tx)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

impl FrameSourcePort for ScriptedFrameSource {
    fn start(&self, camera: &CameraId, _mode: &CameraMode) -> DomainResult<FrameStream> {
        let rx = self
            .frames
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| DomainError::DeviceUnavailable(format!("{}: already streaming", camera.path)))?;
        let released = self.released.clone();
        Ok(FrameStream::new(rx, move || released.store(true, Ordering::SeqCst)))
    }
}

/// Camera that cannot be opened.
pub struct MissingCamera;

impl FrameSourcePort for MissingCamera {
    fn start(&self, camera: &CameraId, _mode: &CameraMode) -> DomainResult<FrameStream> {
        Err(DomainError::DeviceUnavailable(format!("{}: No such device", camera.path)))
    }
}

/// Per-frame scripted results; frames without a script see nothing.
#[derive(Clone, Default)]
pub struct Script {
    results: Arc<Mutex<HashMap<u64, Result<Vec<Prediction>, String>>>>,
}

impl Script {
    pub fn detect(self, seq: u64, predictions: Vec<Prediction>) -> Self {
        self.results.lock().unwrap().insert(seq, Ok(predictions));
        self
    }

    pub fn fail(self, seq: u64, message: &str) -> Self {
        self.results.lock().unwrap().insert(seq, Err(message.to_string()));
        self
    }
}

struct ScriptedDetector {
    script: Script,
}

impl Detector for ScriptedDetector {
    fn detect(&mut self, frame: &Frame, _options: &DetectOptions) -> DomainResult<Vec<Prediction>> {
        match self.script.results.lock().unwrap().get(&frame.seq) {
            Some(Ok(predictions)) => Ok(predictions.clone()),
            Some(Err(message)) => Err(DomainError::Inference(message.clone())),
            None => Ok(vec![]),
        }
    }
}

pub struct ScriptedLoader {
    script: Script,
}

impl ScriptedLoader {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self { script })
    }
}

impl DetectorLoader for ScriptedLoader {
    fn load(&self, _config: &InferenceConfig) -> DomainResult<Box<dyn Detector>> {
        Ok(Box::new(ScriptedDetector { script: self.script.clone() }))
    }
}

/// Detector that holds each call until the test opens the gate, recording the
/// frames it was asked to look at.
pub struct GatedLoader {
    gate: Mutex<Option<std::sync::mpsc::Receiver<()>>>,
    seen: Arc<Mutex<Vec<u64>>>,
    predictions: Vec<Prediction>,
}

impl GatedLoader {
    pub fn new(predictions: Vec<Prediction>) -> (Arc<Self>, std::sync::mpsc::Sender<()>, Arc<Mutex<Vec<u64>>>) {
        let (open, gate) = std::sync::mpsc::channel();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let loader = Self { gate: Mutex::new(Some(gate)), seen: seen.clone(), predictions };
        (Arc::new(loader), open, seen)
    }
}

struct GatedDetector {
    gate: std::sync::mpsc::Receiver<()>,
    seen: Arc<Mutex<Vec<u64>>>,
    predictions: Vec<Prediction>,
}

impl Detector for GatedDetector {
    fn detect(&mut self, frame: &Frame, _options: &DetectOptions) -> DomainResult<Vec<Prediction>> {
        self.seen.lock().unwrap().push(frame.seq);
        self.gate
            .recv()
            .map_err(|_| DomainError::Inference("gate closed".into()))?;
        Ok(self.predictions.clone())
    }
}

impl DetectorLoader for GatedLoader {
    fn load(&self, _config: &InferenceConfig) -> DomainResult<Box<dyn Detector>> {
        let gate = self.gate.lock().unwrap().take().expect("gated detector loaded twice");
        Ok(Box::new(GatedDetector { gate, seen: self.seen.clone(), predictions: self.predictions.clone() }))
    }
}

pub struct CorruptModelLoader;

impl DetectorLoader for CorruptModelLoader {
    fn load(&self, config: &InferenceConfig) -> DomainResult<Box<dyn Detector>> {
        Err(DomainError::ModelLoad(format!("{}: protobuf parsing failed", config.model.onnx_path)))
    }
}

pub struct AnyModel;

#[async_trait]
impl ModelCatalogPort for AnyModel {
    async fn validate_model(&self, _model: &ModelId) -> DomainResult<()> {
        Ok(())
    }
}

pub struct StubRenderer;

impl FrameRenderer for StubRenderer {
    fn render(&self, _frame: &Frame, _detections: &[Detection], _roi: &Roi) -> DomainResult<Vec<u8>> {
        Ok(vec![0xFF, 0xD8, 0xFF, 0xD9])
    }
}

pub struct OneCamera;

#[async_trait]
impl CameraCatalogPort for OneCamera {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        Ok(vec![CameraInfo {
            id: CameraId::from_index(0),
            name: "video0".into(),
            card: "USB Camera".into(),
            driver: "uvcvideo".into(),
            bus: "usb-0000:00:14.0-1".into(),
        }])
    }

    async fn list_formats(&self, camera: &CameraId) -> DomainResult<Vec<PixelFormat>> {
        if camera.path != "/dev/video0" {
            return Err(DomainError::NotFound(camera.path.clone()));
        }
        Ok(vec![
            PixelFormat { fourcc: "YUYV".into(), description: "YUYV 4:2:2".into() },
            PixelFormat { fourcc: "MJPG".into(), description: "Motion-JPEG".into() },
        ])
    }

    async fn list_frame_sizes(&self, _camera: &CameraId, fourcc: &str) -> DomainResult<Vec<FrameSize>> {
        Ok(match fourcc {
            "MJPG" => vec![FrameSize { width: 1280, height: 720 }, FrameSize { width: 640, height: 480 }],
            _ => vec![FrameSize { width: 640, height: 480 }],
        })
    }
}

/// Next cycle report, skipping frames and notices.
pub async fn next_cycle(rx: &mut broadcast::Receiver<StreamEvent>) -> CycleReport {
    next_cycle_with_notices(rx).await.0
}

/// Next cycle report and the notices published before it.
pub async fn next_cycle_with_notices(rx: &mut broadcast::Receiver<StreamEvent>) -> (CycleReport, Vec<Notice>) {
    tokio::time::timeout(WAIT, async {
        let mut notices = Vec::new();
        loop {
            match rx.recv().await.expect("event stream closed") {
                StreamEvent::Cycle(report) => return (report, notices),
                StreamEvent::Notice(notice) => notices.push(notice),
                StreamEvent::Frame { .. } => {}
            }
        }
    })
    .await
    .expect("no cycle report in time")
}

/// Next rendered frame's metadata, skipping cycles and notices.
pub async fn next_frame_meta(rx: &mut broadcast::Receiver<StreamEvent>) -> FrameMeta {
    tokio::time::timeout(WAIT, async {
        loop {
            if let StreamEvent::Frame { meta, .. } = rx.recv().await.expect("event stream closed") {
                return meta;
            }
        }
    })
    .await
    .expect("no frame in time")
}

/// Next notice, skipping frames and cycles.
pub async fn next_notice(rx: &mut broadcast::Receiver<StreamEvent>) -> Notice {
    tokio::time::timeout(WAIT, async {
        loop {
            if let StreamEvent::Notice(notice) = rx.recv().await.expect("event stream closed") {
                return notice;
            }
        }
    })
    .await
    .expect("no notice in time")
}

/// Every notice already queued on `rx`.
pub fn drain_notices(rx: &mut broadcast::Receiver<StreamEvent>) -> Vec<Notice> {
    let mut out = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let StreamEvent::Notice(notice) = event {
            out.push(notice);
        }
    }
    out
}
