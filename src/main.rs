use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tower_http::services::ServeDir;

use waste_sorter::adapters::{
    http::{router, state::HttpState},
    onnx::{model_catalog::OnnxModelCatalog, yolo_engine::OnnxDetectorLoader},
    render::overlay::JpegOverlayRenderer,
    v4l2::{camera_repo::V4l2CameraCatalog, frame_source::V4l2FrameSource},
};
use waste_sorter::application::dataset::{filter_dataset, DatasetPaths};
use waste_sorter::application::services::{CameraService, SessionService, SettingsService};
use waste_sorter::application::upload_service::UploadService;
use waste_sorter::config::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "waste-sorter", version, about = "Counts bottles, cans and cardboard seen by a camera")]
struct Cli {
    /// JSON configuration file.
    #[arg(long, global = true, env = "WASTE_SORTER_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the dashboard server (default).
    Serve,
    /// Copy annotated frames with a valid bounding box into a new directory.
    FilterDataset {
        #[arg(long)]
        annotations: PathBuf,
        #[arg(long)]
        frames: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG=info by default
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let config = AppConfig::load(cli.config.as_deref())?;
            serve(config).await
        }
        Command::FilterDataset { annotations, frames, output } => {
            let paths = DatasetPaths { annotations, frames, output };
            let report = tokio::task::spawn_blocking(move || filter_dataset(&paths)).await??;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}

fn overlay_renderer(config: &AppConfig) -> JpegOverlayRenderer {
    let renderer = JpegOverlayRenderer::new(config.render.jpeg_quality);
    let Some(font) = &config.render.caption_font else {
        return renderer;
    };
    match JpegOverlayRenderer::new(config.render.jpeg_quality).with_font_file(font) {
        Ok(with_font) => with_font,
        Err(e) => {
            tracing::warn!("Detection captions disabled: {e:#}");
            renderer
        }
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    tracing::info!("Initialising adapters");

    let camera_catalog = Arc::new(V4l2CameraCatalog::new());
    let frame_source = Arc::new(V4l2FrameSource::default());
    let model_catalog = Arc::new(OnnxModelCatalog::new());
    let detector_loader = Arc::new(OnnxDetectorLoader);
    let renderer = Arc::new(overlay_renderer(&config));

    let camera = Arc::new(CameraService::new(camera_catalog));
    let session = Arc::new(SessionService::new(
        frame_source,
        detector_loader,
        model_catalog,
        renderer,
        config.session_defaults(),
    ));
    let uploads = Arc::new(UploadService::new(session.events(), config.uploads.max_file_bytes));
    let settings = Arc::new(SettingsService::new(config.initial_settings(), session.events()));

    let static_dir = config.server.static_dir.clone();
    let addr = config.server.addr.clone();
    let state = HttpState {
        camera,
        session: session.clone(),
        uploads,
        settings,
        config: Arc::new(config),
    };
    let app = router(state).fallback_service(ServeDir::new(&static_dir));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Waste sorter listening on http://{addr}");
    tracing::info!("Static files served from {}", static_dir.display());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if session.is_running().await {
        let counts = session.stop().await?;
        tracing::info!(total = counts.total(), "Final counts: {}", serde_json::to_string(&counts)?);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Cannot listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
