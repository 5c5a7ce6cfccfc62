use std::sync::Arc;

use crate::application::services::{CameraService, SessionService, SettingsService};
use crate::application::upload_service::UploadService;
use crate::config::AppConfig;

/// Shared state of the axum handlers: the application services.
#[derive(Clone)]
pub struct HttpState {
    pub camera: Arc<CameraService>,
    pub session: Arc<SessionService>,
    pub uploads: Arc<UploadService>,
    pub settings: Arc<SettingsService>,
    /// Effective configuration, reported by `GET /api/config`.
    pub config: Arc<AppConfig>,
}
