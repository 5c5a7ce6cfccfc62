use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{
    camera::{CameraId, CameraInfo, CameraMode, FrameSize, PixelFormat},
    detection::{Detection, Prediction},
    errors::DomainResult,
    frame::Frame,
    geometry::Roi,
    model::{DetectOptions, InferenceConfig, ModelId},
};

#[async_trait]
pub trait CameraCatalogPort: Send + Sync {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>>;
    async fn list_formats(&self, camera: &CameraId) -> DomainResult<Vec<PixelFormat>>;
    async fn list_frame_sizes(&self, camera: &CameraId, fourcc: &str) -> DomainResult<Vec<FrameSize>>;
}

#[async_trait]
pub trait ModelCatalogPort: Send + Sync {
    async fn validate_model(&self, model: &ModelId) -> DomainResult<()>;
}

/// Camera acquisition. `start` blocks until the device is open (or refused),
/// so async callers run it on a blocking thread.
pub trait FrameSourcePort: Send + Sync {
    fn start(&self, camera: &CameraId, mode: &CameraMode) -> DomainResult<FrameStream>;
}

/// The object detector. Owned by the detection worker thread.
pub trait Detector: Send {
    fn detect(&mut self, frame: &Frame, options: &DetectOptions) -> DomainResult<Vec<Prediction>>;
}

pub trait DetectorLoader: Send + Sync {
    fn load(&self, config: &InferenceConfig) -> DomainResult<Box<dyn Detector>>;
}

/// Draws boxes and the ROI over a frame and encodes it for the dashboard.
pub trait FrameRenderer: Send + Sync {
    fn render(&self, frame: &Frame, detections: &[Detection], roi: &Roi) -> DomainResult<Vec<u8>>;
}

/// Frames from an open camera. Stopping (or dropping) releases the device.
pub struct FrameStream {
    frames: mpsc::Receiver<Frame>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl FrameStream {
    pub fn new(frames: mpsc::Receiver<Frame>, release: impl FnOnce() + Send + 'static) -> Self {
        Self { frames, release: Some(Box::new(release)) }
    }

    pub async fn next(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    pub fn stop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
        self.frames.close();
    }
}

impl Drop for FrameStream {
    fn drop(&mut self) {
        self.stop();
    }
}
