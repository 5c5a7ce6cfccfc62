use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, trace, warn};

use crate::application::ports::{FrameRenderer, FrameStream};
use crate::application::worker::{DetectionWorker, WorkerResponse};
use crate::domain::{
    detection::Detection,
    frame::Frame,
    geometry::Roi,
    session::{LoopState, Session},
    stream::{summarize_detections, CycleReport, FrameMeta, Notice, SessionStatus, StreamEvent},
};

/// Everything the loop shares with the outside world.
pub struct LoopChannels {
    pub events: broadcast::Sender<StreamEvent>,
    pub status: Arc<watch::Sender<SessionStatus>>,
    pub roi: watch::Receiver<Roi>,
    pub stop: watch::Receiver<bool>,
}

/// Drives one session: frames in, detections merged, overlays out.
///
/// Frames keep flowing while the worker runs the detector; only one frame is
/// ever submitted at a time, so detections of frame N are merged before those
/// of any later frame.
pub struct DetectionLoop {
    session: Session,
    frames: FrameStream,
    worker: DetectionWorker,
    renderer: Arc<dyn FrameRenderer>,
    channels: LoopChannels,
    last_detections: Vec<Detection>,
    frames_seen: u64,
    fps_est: f32,
    last_frame_at: Option<Instant>,
}

impl DetectionLoop {
    /// `session` must already be `Streaming` (camera open, model loaded).
    pub fn new(
        session: Session,
        frames: FrameStream,
        worker: DetectionWorker,
        renderer: Arc<dyn FrameRenderer>,
        channels: LoopChannels,
    ) -> Self {
        Self {
            session,
            frames,
            worker,
            renderer,
            channels,
            last_detections: Vec::new(),
            frames_seen: 0,
            fps_est: 0.0,
            last_frame_at: None,
        }
    }

    /// Run until stopped, the camera closes, or the worker dies.
    /// Returns the finished session.
    pub async fn run(mut self) -> Session {
        info!(roi = ?self.session.roi(), "Detection loop started");
        self.publish_status();

        loop {
            if *self.channels.stop.borrow_and_update() {
                break;
            }
            let busy = self.worker.is_busy();

            tokio::select! {
                biased;

                changed = self.channels.stop.changed() => {
                    if changed.is_err() {
                        debug!("Stop handle dropped");
                        break;
                    }
                }

                response = self.worker.next_response(), if busy => match response {
                    Some(response) => self.on_response(response),
                    None => {
                        error!("Detection worker exited, stopping session");
                        self.notify(Notice::error("Detection worker stopped"));
                        break;
                    }
                },

                frame = self.frames.next() => match frame {
                    Some(frame) => self.on_frame(frame),
                    None => {
                        info!("Frame source closed");
                        if self.worker.is_busy() {
                            if let Some(response) = self.worker.next_response().await {
                                self.on_response(response);
                            }
                        }
                        break;
                    }
                },
            }
        }

        self.finish().await
    }

    fn on_frame(&mut self, frame: Frame) {
        self.frames_seen += 1;
        self.update_fps(frame.captured_at);
        self.refresh_roi();
        self.render(&frame);

        if self.worker.is_busy() {
            trace!(seq = frame.seq, "Detector busy, frame only rendered");
            self.publish_status();
            return;
        }

        let seq = frame.seq;
        match self.worker.submit(frame, self.session.roi()) {
            Ok(()) => self.advance(LoopState::Detecting),
            Err(e) => warn!(seq, "Could not submit frame: {e}"),
        }
        self.publish_status();
    }

    fn on_response(&mut self, response: WorkerResponse) {
        match response {
            WorkerResponse::Detections { seq, detections, infer_ms } => {
                self.refresh_roi();
                self.advance(LoopState::Rendered);

                let counted = self.session.apply_frame(&detections);
                for det in &counted {
                    info!(seq, class = %det.class, score = det.score, "Counted new object");
                    self.notify(Notice::success(format!("Detected {}", det.class)));
                }
                if !counted.is_empty() {
                    debug!(seq, "Frame added {}", summarize_detections(&counted));
                }

                let report = CycleReport {
                    seq,
                    infer_ms,
                    detected: detections.len(),
                    counted,
                    counts: self.session.counts().clone(),
                };
                self.last_detections = detections;
                let _ = self.channels.events.send(StreamEvent::Cycle(report));
                self.advance(LoopState::Streaming);
            }
            WorkerResponse::Error { seq, message } => {
                warn!(?seq, "Inference failed: {message}");
                self.notify(Notice::error(format!("Detection failed: {message}")));
                self.advance(LoopState::Streaming);
            }
            WorkerResponse::ModelLoaded => debug!("Unexpected ModelLoaded reply ignored"),
        }
        self.publish_status();
    }

    fn refresh_roi(&mut self) {
        if !self.channels.roi.has_changed().unwrap_or(false) {
            return;
        }
        let roi = *self.channels.roi.borrow_and_update();
        match self.session.set_roi(roi) {
            Ok(()) => info!(?roi, "ROI updated"),
            Err(e) => warn!("Ignoring ROI update: {e}"),
        }
    }

    fn render(&self, frame: &Frame) {
        if self.channels.events.receiver_count() == 0 {
            return;
        }
        let roi = self.session.roi();
        match self.renderer.render(frame, &self.last_detections, &roi) {
            Ok(jpeg) => {
                let meta = FrameMeta {
                    seq: frame.seq,
                    width: frame.width(),
                    height: frame.height(),
                    fps_est: self.fps_est,
                    roi,
                    detections: self.last_detections.clone(),
                };
                let _ = self.channels.events.send(StreamEvent::Frame { meta, jpeg });
            }
            Err(e) => warn!(seq = frame.seq, "Render failed: {e}"),
        }
    }

    /// Smoothed rate of the capture timestamps, not of loop wakeups.
    fn update_fps(&mut self, captured_at: Instant) {
        if let Some(prev) = self.last_frame_at {
            let dt = captured_at.saturating_duration_since(prev).as_secs_f32().max(0.001);
            self.fps_est = 0.9 * self.fps_est + 0.1 * (1.0 / dt);
        }
        self.last_frame_at = Some(captured_at);
    }

    fn advance(&mut self, next: LoopState) {
        if let Err(e) = self.session.transition(next) {
            error!("{e}");
        }
    }

    fn notify(&self, notice: Notice) {
        let _ = self.channels.events.send(StreamEvent::Notice(notice));
    }

    fn publish_status(&self) {
        self.channels.status.send_replace(SessionStatus {
            state: self.session.state(),
            counts: self.session.counts().clone(),
            cycles: self.session.cycles(),
            frames_seen: self.frames_seen,
        });
    }

    async fn finish(self) -> Session {
        let DetectionLoop { mut session, mut frames, worker, channels, frames_seen, .. } = self;

        frames.stop();
        worker.shutdown().await;
        if let Err(e) = session.transition(LoopState::Stopped) {
            error!("{e}");
        }

        channels.status.send_replace(SessionStatus {
            state: session.state(),
            counts: session.counts().clone(),
            cycles: session.cycles(),
            frames_seen,
        });
        info!(
            cycles = session.cycles(),
            frames = frames_seen,
            total = session.counts().total(),
            "Detection loop stopped"
        );
        session
    }
}
