use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};

use crate::application::services::SessionDefaults;
use crate::domain::camera::{CameraId, CameraMode, FrameSize};
use crate::domain::geometry::Roi;
use crate::domain::model::{DetectOptions, InferenceConfig, ModelId, COCO_LABELS};
use crate::domain::settings::Settings;
use crate::domain::tracker::DedupStrategy;

pub const CONFIG_ENV: &str = "WASTE_SORTER_CONFIG";
pub const ADDR_ENV: &str = "WASTE_SORTER_ADDR";
pub const MODEL_ENV: &str = "WASTE_SORTER_MODEL";
pub const CAMERA_INDEX_ENV: &str = "WASTE_SORTER_CAMERA_INDEX";

const DEFAULT_ADDR: &str = "0.0.0.0:8090";
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_ONNX_PATH: &str = "models/waste.onnx";
const DEFAULT_MAX_FILE_BYTES: u64 = 20 * 1024 * 1024;
const DEFAULT_CAPTION_FONT: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub camera: CameraConfig,
    pub model: ModelConfig,
    pub detection: DetectOptions,
    /// Left half of the configured frame when absent.
    pub roi: Option<Roi>,
    pub dedup: DedupStrategy,
    pub settings: SettingsConfig,
    pub uploads: UploadConfig,
    pub render: RenderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub static_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { addr: DEFAULT_ADDR.into(), static_dir: DEFAULT_STATIC_DIR.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub fourcc: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self { index: 0, fourcc: "MJPG".into(), width: 640, height: 480, fps: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub name: String,
    pub onnx_path: String,
    pub input_size: u32,
    pub iou_threshold: f32,
    pub intra_threads: usize,
    pub labels: Vec<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "waste-yolo".into(),
            onnx_path: DEFAULT_ONNX_PATH.into(),
            input_size: 640,
            iou_threshold: 0.45,
            intra_threads: 4,
            labels: COCO_LABELS.iter().map(|l| l.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub toggles: Vec<String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self { toggles: vec!["variable1".into(), "variable2".into(), "variable3".into()] }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_bytes: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self { max_file_bytes: DEFAULT_MAX_FILE_BYTES }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub jpeg_quality: u8,
    /// TrueType font for the detection captions; `null` disables them.
    pub caption_font: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { jpeg_quality: 80, caption_font: Some(DEFAULT_CAPTION_FONT.into()) }
    }
}

impl AppConfig {
    /// File given on the command line, else `WASTE_SORTER_CONFIG`, else defaults.
    /// Environment overrides are applied on top, then the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV).ok().filter(|p| !p.trim().is_empty());
        let path = path.map(Path::to_path_buf).or_else(|| env_path.map(PathBuf::from));

        let mut config = match path {
            Some(path) => read_config_file(&path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(addr) = std::env::var(ADDR_ENV) {
            if !addr.trim().is_empty() {
                self.server.addr = addr;
            }
        }
        if let Ok(model) = std::env::var(MODEL_ENV) {
            if !model.trim().is_empty() {
                self.model.onnx_path = model;
            }
        }
        if let Ok(index) = std::env::var(CAMERA_INDEX_ENV) {
            self.camera.index = index
                .trim()
                .parse()
                .map_err(|_| anyhow!("{CAMERA_INDEX_ENV} must be a non-negative integer"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.camera_mode().validate().map_err(|e| anyhow!("camera: {e}"))?;
        if !(1..=100).contains(&self.render.jpeg_quality) {
            bail!("render jpeg_quality must be within 1..=100, got {}", self.render.jpeg_quality);
        }
        if self.model.input_size == 0 {
            bail!("model input_size must be non-zero");
        }
        if self.model.labels.is_empty() {
            bail!("model labels must not be empty");
        }
        check_iou("model iou_threshold", self.model.iou_threshold)?;
        if !(0.0..=1.0).contains(&self.detection.min_score) {
            bail!("detection min_score must be within [0, 1], got {}", self.detection.min_score);
        }
        if self.detection.max_results == 0 {
            bail!("detection max_results must be at least 1");
        }
        if !self.effective_roi().is_valid() {
            bail!("roi must have a positive size, got {:?}", self.effective_roi());
        }
        if let DedupStrategy::Overlap { iou_threshold, ttl_frames } = self.dedup {
            check_iou("dedup iou_threshold", iou_threshold)?;
            if ttl_frames == 0 {
                bail!("dedup ttl_frames must be at least 1");
            }
        }
        Ok(())
    }

    pub fn effective_roi(&self) -> Roi {
        self.roi
            .unwrap_or_else(|| Roi::left_half(self.camera.width, self.camera.height))
    }

    pub fn session_defaults(&self) -> SessionDefaults {
        SessionDefaults {
            camera: CameraId::from_index(self.camera.index),
            mode: self.camera_mode(),
            inference: InferenceConfig {
                model: ModelId { name: self.model.name.clone(), onnx_path: self.model.onnx_path.clone() },
                input_size: self.model.input_size,
                iou_threshold: self.model.iou_threshold,
                intra_threads: self.model.intra_threads,
                labels: self.model.labels.clone(),
                options: self.detection,
            },
            roi: self.effective_roi(),
            dedup: self.dedup,
        }
    }

    fn camera_mode(&self) -> CameraMode {
        CameraMode {
            format: self.camera.fourcc.clone(),
            size: FrameSize { width: self.camera.width, height: self.camera.height },
            fps: self.camera.fps,
        }
    }

    pub fn initial_settings(&self) -> Settings {
        Settings::with_toggles(self.settings.toggles.iter().cloned())
    }
}

fn check_iou(name: &str, value: f32) -> Result<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(anyhow!("{name} must be within (0, 1], got {value}"))
    }
}

fn read_config_file(path: &Path) -> Result<AppConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
}
