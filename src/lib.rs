//! Hazard Watch
//!
//! Live camera object detection that flags dangerous objects and keeps a local
//! record of every detection.
//!
//! # Pipeline
//!
//! Each captured frame goes through the same steps:
//!
//! 1. **Detect**: a `DetectorBackend` returns labeled, scored boxes.
//! 2. **Classify**: each label is checked against the dangerous-label set.
//! 3. **Record**: every detection becomes one row in the `detections` table.
//! 4. **Annotate**: boxes are outlined red (dangerous) or green (safe).
//! 5. **Display**: the frame is shown and the quit key is polled.
//!
//! # Module Structure
//!
//! - `frame`: captured RGB frames
//! - `ingest`: frame sources (camera devices, synthetic and scripted sources)
//! - `detect`: detector backends, YOLO pre/post-processing, class labels
//! - `classify`: dangerous-label membership
//! - `record`, `storage`: detection records and their SQLite persistence
//! - `annotate`, `display`: overlays and display sinks
//! - `pipeline`: the detection loop state machine
//! - `config`, `ui`: runtime configuration and startup progress output
//!
//! # Features
//!
//! All hardware-facing pieces are opt-in. A default build only runs with a
//! `stub://` camera and the `stub` detector. A real webcam run needs:
//!
//! - `ingest-v4l2`: camera index or `/dev/videoN` capture
//! - `backend-tract`: YOLOv8 ONNX inference (the default `tract` backend)
//! - `display-opencv`: the preview window and the `q` quit key
//!
//! ```text
//! cargo run --release --features ingest-v4l2,backend-tract,display-opencv --bin hazard_watch
//! ```

use anyhow::Result;
use rand::RngCore;
use rusqlite::{Connection, OpenFlags};

pub mod annotate;
pub mod classify;
pub mod config;
pub mod detect;
pub mod display;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod record;
pub mod storage;
pub mod ui;

pub use annotate::{Annotator, Overlay};
pub use classify::{DangerClassifier, DEFAULT_DANGEROUS_LABELS};
pub use config::{DetectorSettings, DisplaySettings, WatchConfig};
pub use detect::{
    build_backend, BoundingBox, DetectionRegion, DetectorBackend, ScriptedBackend, StubBackend,
};
#[cfg(feature = "display-opencv")]
pub use display::WindowSink;
pub use display::{DisplayCommand, DisplaySink, HeadlessSink};
pub use frame::Frame;
pub use ingest::{CameraConfig, CameraSource, FrameSource, ScriptedSource, SourceStats};
pub use pipeline::{DetectionLoop, LoopState, RunSummary, StopReason};
pub use record::{DetectionRecord, DetectionRecorder, NewDetection, TIMESTAMP_FORMAT};
pub use storage::{DetectionStore, InMemoryDetectionStore, SqliteDetectionStore};

/// A fresh shared-cache in-memory SQLite URI, unique per call.
pub fn shared_memory_uri() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!(
        "file:hazard_watch_{:x}?mode=memory&cache=shared",
        u64::from_le_bytes(bytes)
    )
}

pub(crate) fn open_db_connection(db_path: &str) -> Result<Connection> {
    if db_path.starts_with("file:") {
        return Ok(Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI,
        )?);
    }
    Ok(Connection::open(db_path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_memory_uris_are_distinct() {
        let a = shared_memory_uri();
        let b = shared_memory_uri();
        assert!(a.starts_with("file:hazard_watch_"));
        assert_ne!(a, b);
    }

    #[test]
    fn uri_connections_share_one_database() -> Result<()> {
        let uri = shared_memory_uri();
        let first = open_db_connection(&uri)?;
        first.execute_batch("CREATE TABLE probe(x INTEGER); INSERT INTO probe VALUES (7);")?;
        let second = open_db_connection(&uri)?;
        let x: i64 = second.query_row("SELECT x FROM probe", [], |row| row.get(0))?;
        assert_eq!(x, 7);
        Ok(())
    }
}
