use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use tempfile::{Builder, NamedTempFile};

use hazard_watch::config::WatchConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "HAZARD_WATCH_CONFIG",
        "HAZARD_WATCH_DB_PATH",
        "HAZARD_WATCH_CAMERA",
        "HAZARD_WATCH_BACKEND",
        "HAZARD_WATCH_MODEL",
        "HAZARD_WATCH_DANGEROUS_LABELS",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_toml_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
db_path = "hazards.db"

[camera]
device = "stub://porch"
width = 320
height = 240
max_frames = 50

[detector]
backend = "stub"
confidence_threshold = 0.4

[danger]
labels = ["knife", "axe"]

[display]
enabled = false
"#,
    );

    std::env::set_var("HAZARD_WATCH_DB_PATH", "override.db");
    std::env::set_var("HAZARD_WATCH_DANGEROUS_LABELS", "knife, gun ,");

    let cfg = WatchConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.db_path, "override.db");
    assert_eq!(cfg.camera.device, "stub://porch");
    assert_eq!(cfg.camera.width, 320);
    assert_eq!(cfg.camera.max_frames, Some(50));
    assert_eq!(cfg.detector.backend, "stub");
    assert_eq!(cfg.detector.model_path, None);
    assert!((cfg.detector.confidence_threshold - 0.4).abs() < f32::EPSILON);
    assert!((cfg.detector.iou_threshold - 0.7).abs() < f32::EPSILON);
    assert_eq!(cfg.dangerous_labels, vec!["knife", "gun"]);
    assert!(!cfg.display.enabled);

    clear_env();
}

#[test]
fn loads_json_config_named_by_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "db_path": "events_json.db",
            "detector": { "backend": "tract", "model_path": "models/custom.onnx" },
            "display": { "window_title": "Front Door" }
        }"#,
    );
    std::env::set_var("HAZARD_WATCH_CONFIG", file.path());
    std::env::set_var("HAZARD_WATCH_CAMERA", "2");

    let cfg = WatchConfig::load(None).expect("load config");
    assert_eq!(cfg.db_path, "events_json.db");
    assert_eq!(cfg.camera.device, "2");
    assert_eq!(
        cfg.detector.model_path,
        Some(PathBuf::from("models/custom.onnx"))
    );
    assert_eq!(cfg.display.window_title, "Front Door");
    assert!(cfg.display.enabled);

    clear_env();
}

#[test]
fn defaults_apply_without_a_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = WatchConfig::load(None).expect("load defaults");
    assert_eq!(cfg.db_path, "events.db");
    assert_eq!(cfg.camera.device, "0");
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(cfg.detector.model_path, Some(PathBuf::from("yolov8n.onnx")));
    assert_eq!(cfg.dangerous_labels, vec!["knife", "scissors", "gun", "sword"]);
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".toml", "[detector]\nbackend = \"stub\"\nconfidence_threshold = 1.2\n");
    let err = WatchConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("confidence_threshold"));
}

#[test]
fn rejects_empty_label_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HAZARD_WATCH_DANGEROUS_LABELS", " , ");
    assert!(WatchConfig::load(None).is_err());

    clear_env();
}

#[test]
fn env_backend_switch_to_tract_uses_default_model() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".toml", "[detector]\nbackend = \"stub\"\n");
    std::env::set_var("HAZARD_WATCH_BACKEND", "tract");
    let cfg = WatchConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.detector.backend, "tract");
    assert_eq!(cfg.detector.model_path, Some(PathBuf::from("yolov8n.onnx")));

    clear_env();
}

#[test]
fn backend_override_after_load_fills_default_model() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".toml", "[detector]\nbackend = \"stub\"\n");
    let mut cfg = WatchConfig::load(Some(file.path())).expect("load config");
    cfg.detector.backend = "tract".to_string();
    cfg.fill_defaults();
    cfg.validate().expect("tract with default model");
    assert_eq!(cfg.detector.model_path, Some(PathBuf::from("yolov8n.onnx")));
}

#[test]
fn explicit_model_is_kept_on_backend_switch() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("HAZARD_WATCH_BACKEND", "tract");
    std::env::set_var("HAZARD_WATCH_MODEL", "models/yolov8s.onnx");
    let cfg = WatchConfig::load(None).expect("load config");
    assert_eq!(
        cfg.detector.model_path,
        Some(PathBuf::from("models/yolov8s.onnx"))
    );

    clear_env();
}

#[test]
fn rejects_malformed_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(".toml", "db_path = [not toml");
    let err = WatchConfig::load(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}
