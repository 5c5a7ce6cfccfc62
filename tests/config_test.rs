use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use waste_sorter::config::{AppConfig, ADDR_ENV, CAMERA_INDEX_ENV, CONFIG_ENV, MODEL_ENV};
use waste_sorter::domain::tracker::DedupStrategy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [CONFIG_ENV, ADDR_ENV, MODEL_ENV, CAMERA_INDEX_ENV] {
        std::env::remove_var(key);
    }
}

fn config_file(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let config = AppConfig::load(None).expect("load defaults");
    assert_eq!(config, AppConfig::default());
}

#[test]
fn file_values_then_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        r#"{
            "server": { "addr": "127.0.0.1:9000" },
            "camera": { "index": 1, "fourcc": "YUYV" },
            "model": { "onnx_path": "models/file.onnx", "labels": ["bottle", "can"] },
            "detection": { "min_score": 0.6 },
            "roi": { "x": 100, "y": 0, "width": 200, "height": 480 },
            "dedup": { "mode": "overlap", "iou_threshold": 0.4, "ttl_frames": 15 }
        }"#,
    );
    std::env::set_var(MODEL_ENV, "models/env.onnx");
    std::env::set_var(CAMERA_INDEX_ENV, "2");

    let config = AppConfig::load(Some(file.path())).expect("load file");
    clear_env();

    assert_eq!(config.server.addr, "127.0.0.1:9000");
    assert_eq!(config.camera.fourcc, "YUYV");
    assert_eq!(config.camera.index, 2);
    assert_eq!(config.model.onnx_path, "models/env.onnx");
    assert_eq!(config.model.labels, vec!["bottle", "can"]);
    assert_eq!(config.detection.min_score, 0.6);
    assert_eq!(config.detection.max_results, 10);
    assert_eq!(config.dedup, DedupStrategy::Overlap { iou_threshold: 0.4, ttl_frames: 15 });

    let defaults = config.session_defaults();
    assert_eq!(defaults.camera.path, "/dev/video2");
    assert_eq!(defaults.roi.x, 100.0);
}

#[test]
fn config_path_from_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(r#"{ "uploads": { "max_file_bytes": 4096 } }"#);
    std::env::set_var(CONFIG_ENV, file.path());
    std::env::set_var(ADDR_ENV, "0.0.0.0:7000");

    let config = AppConfig::load(None).expect("load from env path");
    clear_env();

    assert_eq!(config.uploads.max_file_bytes, 4096);
    assert_eq!(config.server.addr, "0.0.0.0:7000");
}

#[test]
fn bad_camera_index_env_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var(CAMERA_INDEX_ENV, "front");
    let err = AppConfig::load(None).unwrap_err();
    clear_env();

    assert!(err.to_string().contains(CAMERA_INDEX_ENV));
}

#[test]
fn invalid_file_is_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(r#"{ "camera": { "fps": 500 } }"#);
    assert!(AppConfig::load(Some(file.path())).is_err());

    let file = config_file("{ not json");
    let err = AppConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
