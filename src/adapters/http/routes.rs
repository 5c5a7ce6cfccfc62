use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::adapters::http::state::HttpState;
use crate::application::dto::{
    CameraEntry, FolderRequest, ModesResponse, OkResponse, ResultsResponse, StartSessionRequest, UploadRequest,
};
use crate::config::AppConfig;
use crate::domain::{
    camera::CameraId,
    errors::DomainError,
    geometry::Roi,
    settings::Settings,
    stream::SessionStatus,
    upload::{MaterialCategory, UploadReport},
};

const FPS_OPTIONS: [u32; 3] = [15, 30, 60];

/// `DomainError` rendered as `{ "error": ... }` with a matching status.
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        Self(e)
    }
}

pub fn status_for(e: &DomainError) -> StatusCode {
    match e {
        DomainError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        DomainError::ModelLoad(_) | DomainError::Inference(_) | DomainError::OperationFailed(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        DomainError::InvalidInput(_) | DomainError::Upload { .. } => StatusCode::BAD_REQUEST,
        DomainError::NotFound(_) => StatusCode::NOT_FOUND,
        DomainError::Conflict(_) => StatusCode::CONFLICT,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (status_for(&self.0), Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub async fn get_config(State(st): State<HttpState>) -> Json<AppConfig> {
    Json(st.config.as_ref().clone())
}

pub async fn list_cameras(State(st): State<HttpState>) -> ApiResult<Vec<CameraEntry>> {
    let cameras = st.camera.list_cameras().await?;
    Ok(Json(cameras.into_iter().map(CameraEntry::from).collect()))
}

/// Formats of the camera and the frame sizes of its MJPG mode (or its first format).
pub async fn list_modes_by_index(State(st): State<HttpState>, Path(idx): Path<u32>) -> ApiResult<ModesResponse> {
    let cam = CameraId::from_index(idx);
    let formats = st.camera.list_formats(cam.clone()).await?;
    let frame_sizes = match formats.iter().find(|f| f.fourcc == "MJPG").or(formats.first()) {
        Some(f) => st.camera.list_frame_sizes(cam, f.fourcc.clone()).await?,
        None => vec![],
    };
    Ok(Json(ModesResponse { formats, frame_sizes, fps_options: FPS_OPTIONS.to_vec() }))
}

pub async fn get_session(State(st): State<HttpState>) -> Json<SessionStatus> {
    Json(st.session.status())
}

/// The body is optional; an empty one starts with the configured defaults.
pub async fn start_session(State(st): State<HttpState>, body: Bytes) -> ApiResult<OkResponse> {
    let request: StartSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| DomainError::InvalidInput(format!("start request: {e}")))?
    };
    let start = request.into_start(st.session.defaults())?;
    st.session.start(start).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn stop_session(State(st): State<HttpState>) -> ApiResult<ResultsResponse> {
    let counts = st.session.stop().await?;
    Ok(Json(ResultsResponse { object_counts: counts }))
}

pub async fn get_roi(State(st): State<HttpState>) -> Json<Roi> {
    Json(st.session.roi())
}

pub async fn put_roi(State(st): State<HttpState>, Json(roi): Json<Roi>) -> ApiResult<Roi> {
    st.session.set_roi(roi)?;
    Ok(Json(roi))
}

pub async fn get_results(State(st): State<HttpState>) -> Json<ResultsResponse> {
    Json(ResultsResponse { object_counts: st.session.counts() })
}

pub async fn upload_samples(
    State(st): State<HttpState>,
    Path(category): Path<String>,
    Json(req): Json<UploadRequest>,
) -> ApiResult<UploadReport> {
    let category: MaterialCategory = category.parse()?;
    let report = st.uploads.upload(category, req.paths).await?;
    Ok(Json(report))
}

pub async fn list_uploads(State(st): State<HttpState>) -> Result<impl IntoResponse, ApiError> {
    let categories = st.uploads.summary()?;
    let progress = st.uploads.progress();
    Ok(Json(json!({
        "categories": categories,
        "progress": progress,
        "percent": progress.percent(),
    })))
}

pub async fn get_settings(State(st): State<HttpState>) -> ApiResult<Settings> {
    Ok(Json(st.settings.get()?))
}

pub async fn select_folder(State(st): State<HttpState>, Json(req): Json<FolderRequest>) -> ApiResult<Settings> {
    st.settings.select_folder(req.path)?;
    Ok(Json(st.settings.get()?))
}

pub async fn flip_toggle(State(st): State<HttpState>, Path(name): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let value = st.settings.toggle(&name)?;
    Ok(Json(json!({ "name": name, "value": value })))
}
