use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection};

use crate::detect::BoundingBox;
use crate::open_db_connection;
use crate::record::{DetectionRecord, NewDetection, TIMESTAMP_FORMAT};

/// Append-only detection storage.
///
/// `append` must not return until the row is durable. Stores expose no update
/// or delete operations; `count` and `records` exist for verification.
pub trait DetectionStore {
    /// Append one detection and return its assigned id.
    fn append(&mut self, detection: &NewDetection) -> Result<i64>;

    fn count(&self) -> Result<u64>;

    /// Up to `limit` records in id order.
    fn records(&self, limit: usize) -> Result<Vec<DetectionRecord>>;

    /// Release the underlying handle.
    fn close(self) -> Result<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

pub struct SqliteDetectionStore {
    conn: Connection,
}

impl SqliteDetectionStore {
    /// Open (or create) the database and make sure the `detections` table exists.
    pub fn open(db_path: &str) -> Result<Self> {
        let conn = open_db_connection(db_path)
            .with_context(|| format!("failed to open detection store {}", db_path))?;
        let mut store = Self { conn };
        store
            .ensure_schema()
            .with_context(|| format!("failed to prepare detection store {}", db_path))?;
        Ok(store)
    }

    fn ensure_schema(&mut self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=FULL;

            CREATE TABLE IF NOT EXISTS detections (
              id INTEGER PRIMARY KEY AUTOINCREMENT,
              label TEXT,
              confidence REAL,
              x1 INTEGER,
              y1 INTEGER,
              x2 INTEGER,
              y2 INTEGER,
              dangerous INTEGER,
              timestamp TEXT
            );
            "#,
        )?;
        Ok(())
    }
}

impl DetectionStore for SqliteDetectionStore {
    fn append(&mut self, detection: &NewDetection) -> Result<i64> {
        // Autocommit: the row is committed when execute returns.
        self.conn.execute(
            r#"
            INSERT INTO detections(label, confidence, x1, y1, x2, y2, dangerous, timestamp)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                detection.label,
                f64::from(detection.confidence),
                detection.bbox.x1,
                detection.bbox.y1,
                detection.bbox.x2,
                detection.bbox.y2,
                i64::from(detection.dangerous),
                detection.timestamp_text(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn count(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    fn records(&self, limit: usize) -> Result<Vec<DetectionRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, label, confidence, x1, y1, x2, y2, dangerous, timestamp \
             FROM detections ORDER BY id ASC LIMIT ?1",
        )?;
        let mut rows = stmt.query(params![limit as i64])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let id: i64 = row.get(0)?;
            let confidence: f64 = row.get(2)?;
            let dangerous: i64 = row.get(7)?;
            let timestamp: String = row.get(8)?;
            let timestamp = NaiveDateTime::parse_from_str(&timestamp, TIMESTAMP_FORMAT)
                .map_err(|e| anyhow!("corrupt detection {}: bad timestamp {:?}: {}", id, timestamp, e))?;
            let detection = NewDetection {
                label: row.get(1)?,
                confidence: confidence as f32,
                bbox: BoundingBox::new(row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?),
                dangerous: dangerous != 0,
                timestamp,
            };
            out.push(DetectionRecord::new(id, detection));
        }
        Ok(out)
    }

    fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| anyhow!("failed to close detection store: {}", e))
    }
}

/// Detection store kept in process memory. Used by tests.
#[derive(Clone, Debug, Default)]
pub struct InMemoryDetectionStore {
    records: Vec<DetectionRecord>,
}

impl DetectionStore for InMemoryDetectionStore {
    fn append(&mut self, detection: &NewDetection) -> Result<i64> {
        let id = self.records.last().map_or(1, |r| r.id() + 1);
        self.records
            .push(DetectionRecord::new(id, detection.clone()));
        Ok(id)
    }

    fn count(&self) -> Result<u64> {
        Ok(self.records.len() as u64)
    }

    fn records(&self, limit: usize) -> Result<Vec<DetectionRecord>> {
        Ok(self.records.iter().take(limit).cloned().collect())
    }
}
