use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::detection::{Detection, WasteClass};
use super::geometry::BBox;

/// How a detection is recognised as "already counted".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DedupStrategy {
    /// Identity is the exact box geometry. A one pixel jitter is a new object.
    #[default]
    ExactMatch,
    /// Identity is a short-lived track matched by IoU within the same class.
    /// Tracks not seen for `ttl_frames` frames are forgotten.
    Overlap { iou_threshold: f32, ttl_frames: u64 },
}

#[derive(Debug, Clone)]
struct LiveObject {
    class: WasteClass,
    bbox: BBox,
    last_seen: u64,
}

/// Remembers which detections were already counted in a session.
#[derive(Debug, Clone)]
pub struct DedupTracker {
    strategy: DedupStrategy,
    seen: HashSet<String>,
    live: Vec<LiveObject>,
    frame: u64,
}

impl DedupTracker {
    pub fn new(strategy: DedupStrategy) -> Self {
        Self { strategy, seen: HashSet::new(), live: Vec::new(), frame: 0 }
    }

    pub fn strategy(&self) -> DedupStrategy {
        self.strategy
    }

    /// Advance to the next frame and expire stale overlap tracks.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        if let DedupStrategy::Overlap { ttl_frames, .. } = self.strategy {
            let now = self.frame;
            self.live.retain(|o| now - o.last_seen <= ttl_frames);
        }
    }

    /// Returns `true` the first time an identity is presented and records it.
    pub fn admit(&mut self, det: &Detection) -> bool {
        match self.strategy {
            DedupStrategy::ExactMatch => self.seen.insert(det.bbox.key()),
            DedupStrategy::Overlap { iou_threshold, .. } => {
                let best = self
                    .live
                    .iter()
                    .enumerate()
                    .filter(|(_, o)| o.class == det.class)
                    .map(|(i, o)| (i, o.bbox.iou(&det.bbox)))
                    .filter(|(_, iou)| *iou >= iou_threshold)
                    .max_by(|a, b| a.1.total_cmp(&b.1))
                    .map(|(i, _)| i);

                match best {
                    Some(i) => {
                        let obj = &mut self.live[i];
                        obj.bbox = det.bbox;
                        obj.last_seen = self.frame;
                        false
                    }
                    None => {
                        self.live.push(LiveObject {
                            class: det.class,
                            bbox: det.bbox,
                            last_seen: self.frame,
                        });
                        true
                    }
                }
            }
        }
    }

    /// Number of identities currently remembered.
    pub fn remembered(&self) -> usize {
        match self.strategy {
            DedupStrategy::ExactMatch => self.seen.len(),
            DedupStrategy::Overlap { .. } => self.live.len(),
        }
    }
}
