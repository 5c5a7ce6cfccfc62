use async_trait::async_trait;
use v4l::video::Capture;
use v4l::Device;

use crate::application::ports::CameraCatalogPort;
use crate::domain::camera::{CameraId, CameraInfo, FrameSize, PixelFormat};
use crate::domain::errors::{DomainError, DomainResult};

/// Lists `/dev/video*` capture devices and what they can deliver.
#[derive(Debug, Default)]
pub struct V4l2CameraCatalog;

impl V4l2CameraCatalog {
    pub fn new() -> Self {
        Self
    }
}

fn open(camera: &CameraId) -> DomainResult<Device> {
    Device::with_path(&camera.path).map_err(|e| DomainError::NotFound(format!("{}: {e}", camera.path)))
}

pub(crate) fn parse_fourcc(fourcc: &str) -> Option<v4l::FourCC> {
    let bytes: [u8; 4] = fourcc.as_bytes().try_into().ok()?;
    Some(v4l::FourCC::new(&bytes))
}

#[async_trait]
impl CameraCatalogPort for V4l2CameraCatalog {
    async fn list_cameras(&self) -> DomainResult<Vec<CameraInfo>> {
        let mut out = Vec::new();
        for node in v4l::context::enum_devices() {
            let path = node.path().to_string_lossy().to_string();
            let Ok(dev) = Device::with_path(&path) else { continue };
            let Ok(caps) = dev.query_caps() else { continue };
            out.push(CameraInfo {
                id: CameraId { path },
                name: node.name().unwrap_or_else(|| "Unknown".to_string()),
                driver: caps.driver,
                card: caps.card,
                bus: caps.bus,
            });
        }
        out.sort_by(|a, b| a.id.path.cmp(&b.id.path));
        Ok(out)
    }

    async fn list_formats(&self, camera: &CameraId) -> DomainResult<Vec<PixelFormat>> {
        let dev = open(camera)?;
        let formats = dev.enum_formats().unwrap_or_default();
        Ok(formats
            .into_iter()
            .map(|f| PixelFormat {
                fourcc: f.fourcc.str().unwrap_or("????").to_string(),
                description: f.description,
            })
            .collect())
    }

    async fn list_frame_sizes(&self, camera: &CameraId, fourcc: &str) -> DomainResult<Vec<FrameSize>> {
        let fcc = parse_fourcc(fourcc)
            .ok_or_else(|| DomainError::InvalidInput(format!("fourcc must be 4 characters: {fourcc:?}")))?;
        let dev = open(camera)?;

        let mut out = Vec::new();
        if let Ok(sizes) = dev.enum_framesizes(fcc) {
            for s in sizes {
                for d in s.size.to_discrete() {
                    out.push(FrameSize { width: d.width, height: d.height });
                }
            }
        }
        Ok(out)
    }
}
