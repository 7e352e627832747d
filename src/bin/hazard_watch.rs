//! hazard_watch - live camera detection loop with dangerous-object logging

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use hazard_watch::config::WatchConfig;
use hazard_watch::ui::{Ui, UiMode};
use hazard_watch::{
    build_backend, CameraSource, DangerClassifier, DetectionLoop, DetectionRecorder, DisplaySink,
    HeadlessSink, SqliteDetectionStore,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML, or JSON with a .json extension).
    #[arg(long, env = "HAZARD_WATCH_CONFIG")]
    config: Option<PathBuf>,
    /// Path to the detections database.
    #[arg(long)]
    db: Option<String>,
    /// Camera index, device path, or stub://name for a synthetic camera.
    #[arg(long)]
    camera: Option<String>,
    /// Detector backend (tract|stub).
    #[arg(long)]
    backend: Option<String>,
    /// ONNX model path for the tract backend.
    #[arg(long)]
    model: Option<PathBuf>,
    /// Run without a display window.
    #[arg(long)]
    headless: bool,
    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value = "auto", value_name = "MODE")]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let ui = Ui::new(args.ui, std::io::stderr().is_terminal());

    let cfg = {
        let _stage = ui.stage("Load configuration");
        let mut cfg = WatchConfig::load(args.config.as_deref())?;
        apply_args(&mut cfg, &args);
        cfg.fill_defaults();
        cfg.validate()?;
        cfg
    };

    let interrupt = Arc::new(AtomicBool::new(false));
    {
        let interrupt = Arc::clone(&interrupt);
        ctrlc::set_handler(move || {
            interrupt.store(true, Ordering::SeqCst);
        })
        .context("error setting Ctrl-C handler")?;
    }

    let recorder = {
        let _stage = ui.stage("Open detection store");
        let store = SqliteDetectionStore::open(&cfg.db_path)?;
        let classifier = DangerClassifier::new(&cfg.dangerous_labels)?;
        DetectionRecorder::new(store, classifier)
    };
    let detector = {
        let _stage = ui.stage("Load detector");
        build_backend(&cfg.detector)?
    };
    let source = {
        let _stage = ui.stage("Open camera");
        CameraSource::new(cfg.camera.clone())?
    };
    let display = open_display(&cfg)?;

    log::info!(
        "hazard_watch starting: camera={} backend={} db={}",
        cfg.camera.device,
        cfg.detector.backend,
        cfg.db_path
    );

    let summary = DetectionLoop::new(Box::new(source), detector, recorder, display)
        .with_interrupt(interrupt)
        .run()?;
    ui.summary(&summary);
    Ok(())
}

fn apply_args(cfg: &mut WatchConfig, args: &Args) {
    if let Some(db) = &args.db {
        cfg.db_path = db.clone();
    }
    if let Some(camera) = &args.camera {
        cfg.camera.device = camera.clone();
    }
    if let Some(backend) = &args.backend {
        cfg.detector.backend = backend.clone();
    }
    if let Some(model) = &args.model {
        cfg.detector.model_path = Some(model.clone());
    }
    if args.max_frames.is_some() {
        cfg.camera.max_frames = args.max_frames;
    }
    if args.headless {
        cfg.display.enabled = false;
    }
}

#[cfg(feature = "display-opencv")]
fn open_display(cfg: &WatchConfig) -> Result<Box<dyn DisplaySink>> {
    if cfg.display.enabled {
        return Ok(Box::new(hazard_watch::WindowSink::new(
            cfg.display.window_title.clone(),
        )?));
    }
    Ok(Box::new(HeadlessSink::new()))
}

#[cfg(not(feature = "display-opencv"))]
fn open_display(cfg: &WatchConfig) -> Result<Box<dyn DisplaySink>> {
    if cfg.display.enabled {
        log::warn!("built without display-opencv; running headless (stop with Ctrl-C)");
    }
    Ok(Box::new(HeadlessSink::new()))
}
