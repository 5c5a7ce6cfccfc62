use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{info, trace, warn};
use v4l::Device;

use super::capture::V4l2Capture;
use crate::application::ports::{FrameSourcePort, FrameStream};
use crate::domain::camera::{CameraId, CameraMode};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::frame::Frame;

const CONSECUTIVE_FAILURE_LIMIT: u32 = 30;

/// Camera frames from a dedicated capture thread that owns the device.
pub struct V4l2FrameSource {
    buffer: usize,
}

impl V4l2FrameSource {
    /// `buffer` frames may queue up before the capture thread starts dropping.
    pub fn new(buffer: usize) -> Self {
        Self { buffer: buffer.max(1) }
    }
}

impl Default for V4l2FrameSource {
    fn default() -> Self {
        Self::new(2)
    }
}

impl FrameSourcePort for V4l2FrameSource {
    fn start(&self, camera: &CameraId, mode: &CameraMode) -> DomainResult<FrameStream> {
        let (frames_tx, frames_rx) = mpsc::channel(self.buffer);
        let (opened_tx, opened_rx) = std_mpsc::sync_channel(1);
        let stop = Arc::new(AtomicBool::new(false));

        let path = camera.path.clone();
        let mode = mode.clone();
        let thread_stop = stop.clone();
        thread::Builder::new()
            .name("v4l2-capture".into())
            .spawn(move || capture_loop(&path, &mode, opened_tx, frames_tx, &thread_stop))
            .map_err(|e| DomainError::OperationFailed(format!("spawning capture thread: {e}")))?;

        match opened_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(DomainError::DeviceUnavailable(reason)),
            Err(_) => {
                return Err(DomainError::DeviceUnavailable(format!(
                    "{}: capture thread exited before opening",
                    camera.path
                )))
            }
        }

        Ok(FrameStream::new(frames_rx, move || stop.store(true, Ordering::Release)))
    }
}

fn capture_loop(
    path: &str,
    mode: &CameraMode,
    opened: std_mpsc::SyncSender<Result<(), String>>,
    frames: mpsc::Sender<Frame>,
    stop: &AtomicBool,
) {
    let device = match Device::with_path(path) {
        Ok(d) => d,
        Err(e) => {
            let _ = opened.send(Err(format!("{path}: {e}")));
            return;
        }
    };
    let mut capture = match V4l2Capture::open(&device, mode) {
        Ok(c) => c,
        Err(e) => {
            let _ = opened.send(Err(format!("{path}: {e:#}")));
            return;
        }
    };
    let _ = opened.send(Ok(()));

    let mut seq = 0u64;
    let mut failures = 0u32;
    while !stop.load(Ordering::Acquire) {
        let image = match capture.next_rgb() {
            Ok(image) => {
                failures = 0;
                image
            }
            Err(e) => {
                failures += 1;
                warn!(camera = path, failures, "Frame capture failed: {e:#}");
                if failures >= CONSECUTIVE_FAILURE_LIMIT {
                    break;
                }
                thread::sleep(Duration::from_millis(10));
                continue;
            }
        };

        seq += 1;
        match frames.try_send(Frame::new(seq, image)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!(seq, "Frame dropped, loop is behind"),
            Err(TrySendError::Closed(_)) => break,
        }
    }

    drop(capture);
    drop(device);
    info!(camera = path, frames = seq, "Camera released");
}
