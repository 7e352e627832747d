//! Detection records and the recorder that writes them.

use anyhow::Result;
use chrono::{NaiveDateTime, Timelike};

use crate::classify::DangerClassifier;
use crate::detect::{BoundingBox, DetectionRegion};
use crate::storage::DetectionStore;

/// Text form of record timestamps, second resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A record about to be appended. The store assigns its id.
#[derive(Clone, Debug, PartialEq)]
pub struct NewDetection {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub dangerous: bool,
    pub timestamp: NaiveDateTime,
}

impl NewDetection {
    pub fn from_region(region: &DetectionRegion, dangerous: bool, at: NaiveDateTime) -> Self {
        Self {
            label: region.label.clone(),
            confidence: region.confidence,
            bbox: region.bbox,
            dangerous,
            timestamp: truncate_to_second(at),
        }
    }

    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

/// A persisted detection. Immutable: fields are read through accessors only.
///
/// ```compile_fail
/// fn relabel(record: &mut hazard_watch::DetectionRecord) {
///     record.label = "person".to_string();
/// }
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionRecord {
    id: i64,
    label: String,
    confidence: f32,
    bbox: BoundingBox,
    dangerous: bool,
    timestamp: NaiveDateTime,
}

impl DetectionRecord {
    pub(crate) fn new(id: i64, detection: NewDetection) -> Self {
        Self {
            id,
            label: detection.label,
            confidence: detection.confidence,
            bbox: detection.bbox,
            dangerous: detection.dangerous,
            timestamp: detection.timestamp,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn dangerous(&self) -> bool {
        self.dangerous
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    pub fn timestamp_text(&self) -> String {
        self.timestamp.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn truncate_to_second(at: NaiveDateTime) -> NaiveDateTime {
    at.with_nanosecond(0).unwrap_or(at)
}

/// Turns detection regions into durable records.
///
/// Every call to `record` appends exactly one row and returns only after the
/// store has committed it. There is no update or delete path.
pub struct DetectionRecorder<S: DetectionStore> {
    store: S,
    classifier: DangerClassifier,
    written: u64,
    dangerous_written: u64,
}

impl<S: DetectionStore> DetectionRecorder<S> {
    pub fn new(store: S, classifier: DangerClassifier) -> Self {
        Self {
            store,
            classifier,
            written: 0,
            dangerous_written: 0,
        }
    }

    pub fn classifier(&self) -> &DangerClassifier {
        &self.classifier
    }

    /// Classify `region` and append it, stamped with `at`.
    pub fn record(&mut self, region: &DetectionRegion, at: NaiveDateTime) -> Result<DetectionRecord> {
        let dangerous = self.classifier.is_dangerous(&region.label);
        let detection = NewDetection::from_region(region, dangerous, at);
        let id = self.store.append(&detection)?;

        self.written += 1;
        if dangerous {
            self.dangerous_written += 1;
        }
        Ok(DetectionRecord::new(id, detection))
    }

    /// Records written through this recorder.
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn dangerous_written(&self) -> u64 {
        self.dangerous_written
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Release the storage handle.
    pub fn close(self) -> Result<()> {
        self.store.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryDetectionStore;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32, milli: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_milli_opt(h, m, s, milli))
            .expect("valid timestamp")
    }

    #[test]
    fn record_derives_dangerous_flag_and_truncates_time() -> Result<()> {
        let mut recorder =
            DetectionRecorder::new(InMemoryDetectionStore::default(), DangerClassifier::default());

        let knife = DetectionRegion::new("knife", 0.91, BoundingBox::new(10, 10, 50, 50));
        let person = DetectionRegion::new("person", 0.77, BoundingBox::new(0, 0, 20, 20));

        let r1 = recorder.record(&knife, at(12, 0, 1, 750))?;
        let r2 = recorder.record(&person, at(12, 0, 2, 10))?;

        assert!(r1.dangerous());
        assert!(!r2.dangerous());
        assert_eq!(r1.timestamp_text(), "2024-03-09 12:00:01");
        assert_eq!(r2.timestamp_text(), "2024-03-09 12:00:02");
        assert!(r2.id() > r1.id());
        assert_eq!(recorder.written(), 2);
        assert_eq!(recorder.dangerous_written(), 1);
        assert_eq!(recorder.store().count()?, 2);
        Ok(())
    }

    #[test]
    fn identical_regions_are_not_deduplicated() -> Result<()> {
        let mut recorder =
            DetectionRecorder::new(InMemoryDetectionStore::default(), DangerClassifier::default());
        let cup = DetectionRegion::new("cup", 0.5, BoundingBox::new(1, 2, 3, 4));
        for _ in 0..3 {
            recorder.record(&cup, at(8, 30, 0, 0))?;
        }
        assert_eq!(recorder.store().count()?, 3);
        Ok(())
    }
}
