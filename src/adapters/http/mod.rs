pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::adapters::http::state::HttpState;
use crate::adapters::http::ws::ws_handler;

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/config", get(routes::get_config))
        .route("/api/cameras", get(routes::list_cameras))
        .route("/api/cameras/:index/modes", get(routes::list_modes_by_index))
        .route("/api/session", get(routes::get_session))
        .route("/api/session/start", post(routes::start_session))
        .route("/api/session/stop", post(routes::stop_session))
        .route("/api/roi", get(routes::get_roi).put(routes::put_roi))
        .route("/api/results", get(routes::get_results))
        .route("/api/uploads", get(routes::list_uploads))
        .route("/api/uploads/:category", post(routes::upload_samples))
        .route("/api/settings", get(routes::get_settings))
        .route("/api/settings/folder", put(routes::select_folder))
        .route("/api/settings/toggles/:name", post(routes::flip_toggle))
        .route("/ws/stream", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
