use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use crate::application::ports::{Detector, DetectorLoader};
use crate::domain::{
    detection::{retain_waste, Detection},
    errors::{DomainError, DomainResult},
    frame::Frame,
    geometry::Roi,
    model::InferenceConfig,
};

/// Messages accepted by the detection thread.
#[derive(Debug)]
pub enum WorkerRequest {
    LoadModel,
    DetectFrame { frame: Frame, roi: Roi },
}

/// Replies, one per request, in submission order.
#[derive(Debug)]
pub enum WorkerResponse {
    ModelLoaded,
    Detections {
        seq: u64,
        detections: Vec<Detection>,
        infer_ms: f32,
    },
    Error {
        seq: Option<u64>,
        message: String,
    },
}

/// Handle to the thread that owns the detector.
///
/// At most one `DetectFrame` is in flight; [`DetectionWorker::submit`] refuses
/// a second one until [`DetectionWorker::next_response`] has returned.
pub struct DetectionWorker {
    requests: mpsc::Sender<WorkerRequest>,
    responses: mpsc::Receiver<WorkerResponse>,
    outstanding: Option<u64>,
    thread: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    pub fn spawn(loader: Arc<dyn DetectorLoader>, config: InferenceConfig) -> DomainResult<Self> {
        let (req_tx, mut req_rx) = mpsc::channel::<WorkerRequest>(1);
        let (resp_tx, resp_rx) = mpsc::channel::<WorkerResponse>(1);

        let thread = std::thread::Builder::new()
            .name("detection-worker".into())
            .spawn(move || {
                info!(model = %config.model.name, "Detection worker started");
                let mut detector: Option<Box<dyn Detector>> = None;

                while let Some(request) = req_rx.blocking_recv() {
                    let response = handle_request(loader.as_ref(), &config, &mut detector, request);
                    if resp_tx.blocking_send(response).is_err() {
                        break;
                    }
                }
                debug!("Detection worker exiting");
            })
            .map_err(|e| DomainError::OperationFailed(format!("cannot spawn detection worker: {e}")))?;

        Ok(Self {
            requests: req_tx,
            responses: resp_rx,
            outstanding: None,
            thread: Some(thread),
        })
    }

    /// Ask the worker to load the model and wait for the answer.
    pub async fn load_model(&mut self) -> DomainResult<()> {
        if self.outstanding.is_some() {
            return Err(DomainError::Conflict("a detection is still in flight".into()));
        }
        self.requests
            .send(WorkerRequest::LoadModel)
            .await
            .map_err(|_| DomainError::ModelLoad("detection worker exited".into()))?;

        match self.responses.recv().await {
            Some(WorkerResponse::ModelLoaded) => Ok(()),
            Some(WorkerResponse::Error { message, .. }) => Err(DomainError::ModelLoad(message)),
            Some(other) => Err(DomainError::ModelLoad(format!("unexpected worker reply: {other:?}"))),
            None => Err(DomainError::ModelLoad("detection worker exited".into())),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Sequence number of the frame being detected, if any.
    pub fn outstanding(&self) -> Option<u64> {
        self.outstanding
    }

    pub fn submit(&mut self, frame: Frame, roi: Roi) -> DomainResult<()> {
        if let Some(seq) = self.outstanding {
            return Err(DomainError::Conflict(format!("frame {seq} is still being detected")));
        }
        let seq = frame.seq;
        self.requests
            .try_send(WorkerRequest::DetectFrame { frame, roi })
            .map_err(|e| match e {
                TrySendError::Full(_) => DomainError::Conflict("detection queue is full".into()),
                TrySendError::Closed(_) => DomainError::OperationFailed("detection worker exited".into()),
            })?;
        self.outstanding = Some(seq);
        Ok(())
    }

    /// Wait for the reply to the in-flight request. Cancel safe.
    pub async fn next_response(&mut self) -> Option<WorkerResponse> {
        let response = self.responses.recv().await;
        self.outstanding = None;
        response
    }

    /// Close the request channel and wait for the thread to drop the detector.
    pub async fn shutdown(self) {
        let Self { requests, responses, thread, .. } = self;
        drop(requests);
        drop(responses);
        if let Some(thread) = thread {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => {}
                _ => warn!("Detection worker did not exit cleanly"),
            }
        }
    }
}

fn handle_request(
    loader: &dyn DetectorLoader,
    config: &InferenceConfig,
    detector: &mut Option<Box<dyn Detector>>,
    request: WorkerRequest,
) -> WorkerResponse {
    match request {
        WorkerRequest::LoadModel => match loader.load(config) {
            Ok(loaded) => {
                *detector = Some(loaded);
                info!(path = %config.model.onnx_path, "Model loaded");
                WorkerResponse::ModelLoaded
            }
            Err(e) => WorkerResponse::Error { seq: None, message: e.to_string() },
        },
        WorkerRequest::DetectFrame { frame, roi } => {
            let seq = frame.seq;
            let Some(det) = detector.as_mut() else {
                return WorkerResponse::Error { seq: Some(seq), message: "model not loaded".into() };
            };
            trace!(seq, ?roi, "Running detector");

            let started = Instant::now();
            let result = catch_unwind(AssertUnwindSafe(|| det.detect(&frame, &config.options)));
            let infer_ms = started.elapsed().as_secs_f32() * 1000.0;

            match result {
                Ok(Ok(predictions)) => WorkerResponse::Detections {
                    seq,
                    detections: retain_waste(predictions),
                    infer_ms,
                },
                Ok(Err(e)) => WorkerResponse::Error { seq: Some(seq), message: e.to_string() },
                Err(_) => WorkerResponse::Error { seq: Some(seq), message: "detector panicked".into() },
            }
        }
    }
}
