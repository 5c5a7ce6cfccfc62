use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::counts::ObjectCounts;
use super::detection::Detection;
use super::geometry::Roi;
use super::session::LoopState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    pub fps_est: f32,
    pub roi: Roi,
    pub detections: Vec<Detection>,
}

/// Outcome of one completed detection cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub seq: u64,
    pub infer_ms: f32,
    pub detected: usize,
    pub counted: Vec<Detection>,
    pub counts: ObjectCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
}

/// User-facing toast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { level: NoticeLevel::Error, message: message.into() }
    }
}

/// What the loop (and the upload service) publishes to dashboard subscribers.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Frame { meta: FrameMeta, jpeg: Vec<u8> },
    Cycle(CycleReport),
    Notice(Notice),
}

/// JSON messages sent over the websocket; the JPEG of a frame follows as binary.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WsMessage<'a> {
    Frame { meta: &'a FrameMeta },
    Cycle { report: &'a CycleReport },
    Notice { notice: &'a Notice },
}

/// Snapshot of the running (or last) session for the HTTP layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub state: LoopState,
    pub counts: ObjectCounts,
    pub cycles: u64,
    pub frames_seen: u64,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            state: LoopState::Idle,
            counts: ObjectCounts::new(),
            cycles: 0,
            frames_seen: 0,
        }
    }
}

/// "2 bottle, 1 can" style summary for logs.
pub fn summarize_detections(detections: &[Detection]) -> String {
    let mut counts = BTreeMap::new();
    for det in detections {
        *counts.entry(det.class).or_insert(0) += 1;
    }
    counts
        .iter()
        .map(|(class, count)| format!("{count} {class}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::detection::WasteClass;
    use crate::domain::geometry::BBox;

    #[test]
    fn summary_groups_by_class() {
        let b = BBox::new(0.0, 0.0, 1.0, 1.0);
        let dets = vec![
            Detection::new(WasteClass::Can, 0.9, b),
            Detection::new(WasteClass::Bottle, 0.9, b),
            Detection::new(WasteClass::Bottle, 0.8, b),
        ];
        assert_eq!(summarize_detections(&dets), "2 bottle, 1 can");
        assert_eq!(summarize_detections(&[]), "");
    }

    #[test]
    fn ws_messages_are_tagged() {
        let notice = Notice::error("Detection failed");
        let json = serde_json::to_value(WsMessage::Notice { notice: &notice }).unwrap();
        assert_eq!(json["type"], "notice");
        assert_eq!(json["notice"]["level"], "error");
    }
}
