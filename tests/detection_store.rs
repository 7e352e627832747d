use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::Connection;

use hazard_watch::{
    BoundingBox, DangerClassifier, DetectionRecorder, DetectionRegion, DetectionStore,
    SqliteDetectionStore,
};

fn fixed_time() -> chrono::NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 12, 31)
        .and_then(|d| d.and_hms_micro_opt(23, 59, 58, 750_000))
        .expect("valid time")
}

#[test]
fn opening_twice_keeps_one_schema_and_existing_rows() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("events.db");
    let db = db.to_string_lossy();

    {
        let mut recorder =
            DetectionRecorder::new(SqliteDetectionStore::open(&db)?, DangerClassifier::default());
        recorder.record(
            &DetectionRegion::new("knife", 0.8, BoundingBox::new(1, 1, 9, 9)),
            fixed_time(),
        )?;
        recorder.close()?;
    }

    let store = SqliteDetectionStore::open(&db)?;
    assert_eq!(store.count()?, 1);
    let again = SqliteDetectionStore::open(&db)?;
    assert_eq!(again.count()?, 1);

    let conn = Connection::open(&*db)?;
    let tables: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'detections'",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(tables, 1);
    Ok(())
}

#[test]
fn rows_store_flag_as_integer_and_second_precision_text() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("events.db");
    let db = db.to_string_lossy();

    let mut recorder =
        DetectionRecorder::new(SqliteDetectionStore::open(&db)?, DangerClassifier::default());
    recorder.record(
        &DetectionRegion::new("scissors", 0.66, BoundingBox::new(5, 6, 7, 8)),
        fixed_time(),
    )?;
    recorder.record(
        &DetectionRegion::new("cup", 0.33, BoundingBox::new(0, 0, 1, 1)),
        fixed_time(),
    )?;
    recorder.close()?;

    let conn = Connection::open(&*db)?;
    let mut stmt = conn.prepare(
        "SELECT label, x1, y1, x2, y2, dangerous, timestamp, typeof(dangerous) \
         FROM detections ORDER BY id",
    )?;
    let rows: Vec<(String, i64, i64, i64, i64, i64, String, String)> = stmt
        .query_map([], |row| {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?
        .collect::<rusqlite::Result<_>>()?;

    assert_eq!(rows.len(), 2);
    let (label, x1, y1, x2, y2, dangerous, timestamp, kind) = &rows[0];
    assert_eq!(label, "scissors");
    assert_eq!((*x1, *y1, *x2, *y2), (5, 6, 7, 8));
    assert_eq!(*dangerous, 1);
    assert_eq!(kind, "integer");
    assert_eq!(timestamp, "2025-12-31 23:59:58");

    assert_eq!(rows[1].0, "cup");
    assert_eq!(rows[1].5, 0);
    Ok(())
}

#[test]
fn shared_memory_store_is_visible_to_a_second_handle() -> Result<()> {
    let uri = hazard_watch::shared_memory_uri();
    let mut recorder =
        DetectionRecorder::new(SqliteDetectionStore::open(&uri)?, DangerClassifier::default());
    let record = recorder.record(
        &DetectionRegion::new("gun", 0.97, BoundingBox::new(3, 3, 30, 30)),
        fixed_time(),
    )?;
    assert!(record.dangerous());

    let reader = SqliteDetectionStore::open(&uri)?;
    let records = reader.records(5)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), record.id());
    assert_eq!(records[0].timestamp(), record.timestamp());
    Ok(())
}

#[test]
fn open_fails_when_the_database_cannot_be_created() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("missing").join("events.db");

    let err = match SqliteDetectionStore::open(&db.to_string_lossy()) {
        Ok(_) => panic!("opening under a missing directory must fail"),
        Err(err) => err,
    };
    assert!(err.to_string().contains("failed to open detection store"));
    assert!(!db.exists());
    Ok(())
}
