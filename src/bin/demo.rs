//! demo - scripted end-to-end run: no camera, no model

use anyhow::Result;
use clap::Parser;

use hazard_watch::{
    BoundingBox, DangerClassifier, DetectionLoop, DetectionRecorder, DetectionRegion,
    DetectionStore, HeadlessSink, ScriptedBackend, ScriptedSource, SqliteDetectionStore,
};

const DEFAULT_DB_PATH: &str = "demo_detections.db";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Database the demo records into. Existing rows are kept.
    #[arg(long, default_value = DEFAULT_DB_PATH)]
    db: String,
    /// Frame width of the synthetic stream.
    #[arg(long, default_value_t = 320)]
    width: u32,
    /// Frame height of the synthetic stream.
    #[arg(long, default_value_t = 240)]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    // Frame 1: nothing. Frame 2: a knife. Frame 3: a person.
    let script = vec![
        vec![],
        vec![DetectionRegion::new(
            "knife",
            0.91,
            BoundingBox::new(10, 10, 50, 50),
        )],
        vec![DetectionRegion::new(
            "person",
            0.77,
            BoundingBox::new(0, 0, 20, 20),
        )],
    ];
    let frames = script.len() as u64;

    let store = SqliteDetectionStore::open(&args.db)?;
    let recorder = DetectionRecorder::new(store, DangerClassifier::default());
    let summary = DetectionLoop::new(
        Box::new(ScriptedSource::blank("demo", frames, args.width, args.height)),
        Box::new(ScriptedBackend::new(script)),
        recorder,
        Box::new(HeadlessSink::new()),
    )
    .run()?;

    let store = SqliteDetectionStore::open(&args.db)?;
    let total = store.count()?;
    let records = store.records(total as usize)?;
    let fresh = records
        .iter()
        .skip(records.len().saturating_sub(summary.records_written as usize));
    for record in fresh {
        let row = serde_json::json!({
            "id": record.id(),
            "label": record.label(),
            "confidence": record.confidence(),
            "box": [record.bbox().x1, record.bbox().y1, record.bbox().x2, record.bbox().y2],
            "dangerous": record.dangerous(),
            "timestamp": record.timestamp_text(),
        });
        println!("{}", serde_json::to_string(&row)?);
    }

    println!(
        "demo complete: frames={} records={} dangerous={} stop={:?} db={} (total rows {})",
        summary.frames_processed,
        summary.records_written,
        summary.dangerous_records,
        summary.stop_reason,
        args.db,
        total
    );
    Ok(())
}
