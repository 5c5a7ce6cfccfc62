use serde::{Deserialize, Serialize};

use super::errors::{DomainError, DomainResult};

pub const MAX_FPS: u32 = 120;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CameraId {
    pub path: String,
}

impl CameraId {
    pub fn from_index(index: u32) -> Self {
        Self { path: format!("/dev/video{index}") }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraInfo {
    pub id: CameraId,
    pub name: String,
    pub card: String,
    pub driver: String,
    pub bus: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelFormat {
    pub fourcc: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraMode {
    pub format: String,
    pub size: FrameSize,
    pub fps: u32,
}

impl CameraMode {
    /// Rejects modes no driver accepts: zero sizes, fps outside `1..=MAX_FPS`,
    /// and pixel formats that are not a fourcc.
    pub fn validate(&self) -> DomainResult<()> {
        let FrameSize { width, height } = self.size;
        if width == 0 || height == 0 {
            return Err(DomainError::InvalidInput(format!("frame size must be non-zero, got {width}x{height}")));
        }
        if !(1..=MAX_FPS).contains(&self.fps) {
            return Err(DomainError::InvalidInput(format!("fps must be within 1..={MAX_FPS}, got {}", self.fps)));
        }
        if self.format.len() != 4 {
            return Err(DomainError::InvalidInput(format!("fourcc must be 4 characters, got {:?}", self.format)));
        }
        Ok(())
    }
}
