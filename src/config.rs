use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::classify::DEFAULT_DANGEROUS_LABELS;
use crate::detect::yolo::YoloParams;
use crate::ingest::CameraConfig;

const DEFAULT_DB_PATH: &str = "events.db";
const DEFAULT_CAMERA: &str = "0";
const DEFAULT_CAMERA_FPS: u32 = 30;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_BACKEND: &str = "tract";
const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_WINDOW_TITLE: &str = "YOLO Detection";

const KNOWN_BACKENDS: [&str; 2] = ["stub", "tract"];

#[derive(Debug, Deserialize, Default)]
struct WatchConfigFile {
    db_path: Option<String>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    danger: Option<DangerConfigFile>,
    display: Option<DisplayConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    max_frames: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    class_names_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DangerConfigFile {
    labels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    enabled: Option<bool>,
    window_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchConfig {
    pub db_path: String,
    pub camera: CameraConfig,
    pub detector: DetectorSettings,
    pub dangerous_labels: Vec<String>,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
    pub class_names_path: Option<PathBuf>,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl DetectorSettings {
    pub fn yolo_params(&self) -> YoloParams {
        YoloParams {
            input_size: self.input_size,
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            ..YoloParams::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplaySettings {
    pub enabled: bool,
    pub window_title: String,
}

impl WatchConfig {
    /// Load configuration: optional file, then environment overrides, then validation.
    ///
    /// The file is `path` if given, else `HAZARD_WATCH_CONFIG` if set. Files ending in
    /// `.json` are read as JSON, anything else as TOML.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("HAZARD_WATCH_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => WatchConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.fill_defaults();
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: WatchConfigFile) -> Self {
        let camera = file.camera.unwrap_or_default();
        let detector = file.detector.unwrap_or_default();
        let display = file.display.unwrap_or_default();
        let backend = detector
            .backend
            .unwrap_or_else(|| DEFAULT_BACKEND.to_string());
        let defaults = YoloParams::default();

        Self {
            db_path: file.db_path.unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            camera: CameraConfig {
                device: camera.device.unwrap_or_else(|| DEFAULT_CAMERA.to_string()),
                target_fps: camera.target_fps.unwrap_or(DEFAULT_CAMERA_FPS),
                width: camera.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
                height: camera.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
                max_frames: camera.max_frames,
            },
            detector: DetectorSettings {
                backend,
                model_path: detector.model_path,
                class_names_path: detector.class_names_path,
                input_size: detector.input_size.unwrap_or(defaults.input_size),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.confidence_threshold),
                iou_threshold: detector.iou_threshold.unwrap_or(defaults.iou_threshold),
            },
            dangerous_labels: file
                .danger
                .and_then(|danger| danger.labels)
                .unwrap_or_else(|| {
                    DEFAULT_DANGEROUS_LABELS
                        .iter()
                        .map(|label| label.to_string())
                        .collect()
                }),
            display: DisplaySettings {
                enabled: display.enabled.unwrap_or(true),
                window_title: display
                    .window_title
                    .unwrap_or_else(|| DEFAULT_WINDOW_TITLE.to_string()),
            },
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("HAZARD_WATCH_DB_PATH") {
            if !path.trim().is_empty() {
                self.db_path = path;
            }
        }
        if let Ok(device) = std::env::var("HAZARD_WATCH_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(backend) = std::env::var("HAZARD_WATCH_BACKEND") {
            if !backend.trim().is_empty() {
                self.detector.backend = backend.trim().to_string();
            }
        }
        if let Ok(model) = std::env::var("HAZARD_WATCH_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = Some(PathBuf::from(model));
            }
        }
        if let Ok(labels) = std::env::var("HAZARD_WATCH_DANGEROUS_LABELS") {
            let parsed = split_csv(&labels);
            if parsed.is_empty() {
                return Err(anyhow!(
                    "HAZARD_WATCH_DANGEROUS_LABELS must list at least one label"
                ));
            }
            self.dangerous_labels = parsed;
        }
        Ok(())
    }

    /// Fill settings that depend on other settings. Call again after any override.
    ///
    /// The tract backend falls back to `yolov8n.onnx` when no model is given.
    pub fn fill_defaults(&mut self) {
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            self.detector.model_path = Some(PathBuf::from(DEFAULT_MODEL_PATH));
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.db_path.trim().is_empty() {
            return Err(anyhow!("db_path must not be empty"));
        }
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if !KNOWN_BACKENDS.contains(&self.detector.backend.as_str()) {
            return Err(anyhow!(
                "unknown detector backend '{}' (expected one of {:?})",
                self.detector.backend,
                KNOWN_BACKENDS
            ));
        }
        if self.detector.backend == "tract" && self.detector.model_path.is_none() {
            return Err(anyhow!("detector backend 'tract' requires model_path"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        for (name, value) in [
            ("confidence_threshold", self.detector.confidence_threshold),
            ("iou_threshold", self.detector.iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("detector {} must be within 0..=1, got {}", name, value));
            }
        }
        if self.dangerous_labels.is_empty() {
            return Err(anyhow!("danger labels must not be empty"));
        }
        if self.dangerous_labels.iter().any(|label| label.trim().is_empty()) {
            return Err(anyhow!("danger labels must not contain blank entries"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<WatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    } else {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
