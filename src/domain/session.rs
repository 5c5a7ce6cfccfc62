use serde::{Deserialize, Serialize};

use super::counts::ObjectCounts;
use super::detection::Detection;
use super::errors::{DomainError, DomainResult};
use super::geometry::{is_in_roi, Roi};
use super::tracker::{DedupStrategy, DedupTracker};

/// Detection cycle state. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    Streaming,
    Detecting,
    Rendered,
    Stopped,
}

impl LoopState {
    pub fn can_transition_to(self, next: LoopState) -> bool {
        use LoopState::*;
        match (self, next) {
            (Stopped, _) => false,
            (_, Stopped) => true,
            (Idle, Streaming)
            | (Streaming, Detecting)
            | (Detecting, Rendered)
            | (Detecting, Streaming)
            | (Rendered, Streaming) => true,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Observation {
    pub counted: bool,
}

/// Everything one camera session owns: ROI, seen identities and counts.
#[derive(Debug, Clone)]
pub struct Session {
    roi: Roi,
    tracker: DedupTracker,
    counts: ObjectCounts,
    state: LoopState,
    cycles: u64,
}

impl Session {
    pub fn new(roi: Roi, strategy: DedupStrategy) -> Self {
        Self {
            roi,
            tracker: DedupTracker::new(strategy),
            counts: ObjectCounts::new(),
            state: LoopState::Idle,
            cycles: 0,
        }
    }

    pub fn roi(&self) -> Roi {
        self.roi
    }

    pub fn set_roi(&mut self, roi: Roi) -> DomainResult<()> {
        if !roi.is_valid() {
            return Err(DomainError::InvalidInput(format!("roi must have a positive size: {roi:?}")));
        }
        self.roi = roi;
        Ok(())
    }

    pub fn counts(&self) -> &ObjectCounts {
        &self.counts
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Completed detection cycles.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn tracker(&self) -> &DedupTracker {
        &self.tracker
    }

    pub fn transition(&mut self, next: LoopState) -> DomainResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(DomainError::OperationFailed(format!(
                "invalid loop transition {:?} -> {:?}",
                self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Count `det` if it overlaps the ROI and its identity is new.
    pub fn observe(&mut self, det: &Detection) -> Observation {
        if !is_in_roi(&det.bbox, &self.roi) {
            return Observation { counted: false };
        }
        if !self.tracker.admit(det) {
            return Observation { counted: false };
        }
        self.counts.increment(det.class);
        Observation { counted: true }
    }

    /// Merge one frame's detections. Returns those that were newly counted.
    pub fn apply_frame(&mut self, detections: &[Detection]) -> Vec<Detection> {
        self.tracker.begin_frame();
        self.cycles += 1;
        detections
            .iter()
            .filter(|d| self.observe(d).counted)
            .cloned()
            .collect()
    }
}
