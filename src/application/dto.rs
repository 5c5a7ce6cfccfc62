use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::application::services::{SessionDefaults, StartSession};
use crate::domain::{
    camera::{CameraId, CameraInfo, CameraMode, FrameSize, PixelFormat},
    counts::ObjectCounts,
    errors::{DomainError, DomainResult},
};

/// Body of `POST /api/session/start`. Missing fields fall back to the configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StartSessionRequest {
    pub camera_index: Option<u32>,
    pub fourcc: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<u32>,
    pub model_path: Option<String>,
}

impl StartSessionRequest {
    /// Merges the overrides over `defaults`. An overridden mode must be one a
    /// camera could accept.
    pub fn into_start(self, defaults: &SessionDefaults) -> DomainResult<StartSession> {
        let mode_overridden =
            self.fourcc.is_some() || self.width.is_some() || self.height.is_some() || self.fps.is_some();
        let mode = mode_overridden.then(|| {
            let base = &defaults.mode;
            CameraMode {
                format: self.fourcc.clone().unwrap_or_else(|| base.format.clone()),
                size: FrameSize {
                    width: self.width.unwrap_or(base.size.width),
                    height: self.height.unwrap_or(base.size.height),
                },
                fps: self.fps.unwrap_or(base.fps),
            }
        });

        if let Some(mode) = &mode {
            mode.validate()?;
        }
        if self.model_path.as_deref().is_some_and(|p| p.trim().is_empty()) {
            return Err(DomainError::InvalidInput("model_path must not be empty".into()));
        }

        Ok(StartSession {
            camera: self.camera_index.map(CameraId::from_index),
            mode,
            onnx_path: self.model_path,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadRequest {
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderRequest {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    #[serde(rename = "objectCounts")]
    pub object_counts: ObjectCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraEntry {
    pub index: u32,
    pub card: String,
    pub path: String,
}

impl From<CameraInfo> for CameraEntry {
    fn from(c: CameraInfo) -> Self {
        let index = c
            .id
            .path
            .chars()
            .filter(|ch| ch.is_ascii_digit())
            .collect::<String>()
            .parse::<u32>()
            .unwrap_or(0);
        Self { index, card: c.card, path: c.id.path }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModesResponse {
    pub formats: Vec<PixelFormat>,
    pub frame_sizes: Vec<FrameSize>,
    pub fps_options: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}
