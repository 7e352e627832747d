//! The detection loop.
//!
//! `DetectionLoop` owns every collaborator for its lifetime and moves through
//! `Init -> Running -> Stopped`:
//!
//! 1. Init: connect the frame source and warm up the detector. Failure is fatal.
//! 2. Running: per frame, detect, then classify and record each region, annotate,
//!    present, and poll for quit. Iterations always run to completion.
//! 3. Stopped: release the source, close the display, close the store.
//!
//! A frame read failure ends the stream like exhaustion does. A detector,
//! storage or display failure aborts the run with an error after resources are
//! released. Nothing is retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};

use crate::annotate::{Annotator, Overlay};
use crate::detect::DetectorBackend;
use crate::display::{DisplayCommand, DisplaySink};
use crate::ingest::FrameSource;
use crate::record::DetectionRecorder;
use crate::storage::DetectionStore;

const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Init,
    Running,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// The source reported no more frames.
    EndOfStream,
    /// A frame read failed; treated as the end of the stream.
    FrameReadFailed,
    /// The display sink reported the quit key.
    QuitRequested,
    /// The interrupt flag was raised (Ctrl-C).
    Interrupted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub records_written: u64,
    pub dangerous_records: u64,
    pub stop_reason: StopReason,
}

/// Wall-clock source for record timestamps.
pub type Clock = Box<dyn FnMut() -> NaiveDateTime>;

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

pub struct DetectionLoop<S: DetectionStore> {
    source: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    recorder: DetectionRecorder<S>,
    annotator: Annotator,
    display: Box<dyn DisplaySink>,
    interrupt: Option<Arc<AtomicBool>>,
    clock: Clock,
    state: LoopState,
    frames_processed: u64,
    last_health_log: Instant,
}

impl<S: DetectionStore> DetectionLoop<S> {
    pub fn new(
        source: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
        recorder: DetectionRecorder<S>,
        display: Box<dyn DisplaySink>,
    ) -> Self {
        Self {
            source,
            detector,
            recorder,
            annotator: Annotator::default(),
            display,
            interrupt: None,
            clock: Box::new(local_now),
            state: LoopState::Init,
            frames_processed: 0,
            last_health_log: Instant::now(),
        }
    }

    pub fn with_annotator(mut self, annotator: Annotator) -> Self {
        self.annotator = annotator;
        self
    }

    /// Stop after the current iteration once `flag` is raised.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    /// Acquire the frame source and warm up the detector.
    pub fn start(&mut self) -> Result<()> {
        if self.state != LoopState::Init {
            return Err(anyhow!("detection loop already started ({:?})", self.state));
        }
        self.source.connect().context("failed to acquire frame source")?;
        self.detector
            .warm_up()
            .with_context(|| format!("failed to warm up {} detector", self.detector.name()))?;
        self.state = LoopState::Running;
        log::info!(
            "detection loop running: detector={} dangerous={:?}",
            self.detector.name(),
            self.recorder.classifier().labels()
        );
        Ok(())
    }

    /// Run until the stream ends, a quit is requested, or a step fails.
    ///
    /// Starts the loop first if `start` has not been called.
    pub fn run(mut self) -> Result<RunSummary> {
        if self.state == LoopState::Init {
            if let Err(e) = self.start() {
                if let Err(close_err) = self.stop() {
                    log::warn!("cleanup after failed start: {:#}", close_err);
                }
                return Err(e);
            }
        }
        let outcome = self.drive();
        let frames_processed = self.frames_processed;
        let records_written = self.recorder.written();
        let dangerous_records = self.recorder.dangerous_written();
        let released = self.stop();

        let stop_reason = outcome?;
        released?;

        let summary = RunSummary {
            frames_processed,
            records_written,
            dangerous_records,
            stop_reason,
        };
        log::info!(
            "detection loop stopped ({:?}): frames={} records={} dangerous={}",
            summary.stop_reason,
            summary.frames_processed,
            summary.records_written,
            summary.dangerous_records
        );
        Ok(summary)
    }

    fn drive(&mut self) -> Result<StopReason> {
        loop {
            if let Some(reason) = self.step()? {
                return Ok(reason);
            }
            self.log_health();
        }
    }

    /// One full iteration. Returns the stop reason when the loop should end.
    fn step(&mut self) -> Result<Option<StopReason>> {
        let mut frame = match self.source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                log::info!("frame source exhausted");
                return Ok(Some(StopReason::EndOfStream));
            }
            Err(e) => {
                log::warn!("frame read failed, ending stream: {:#}", e);
                return Ok(Some(StopReason::FrameReadFailed));
            }
        };

        let regions = self
            .detector
            .detect(&frame)
            .with_context(|| format!("detection failed on frame {}", frame.sequence()))?;
        log::debug!("frame {}: {} detections", frame.sequence(), regions.len());

        let mut overlays = Vec::with_capacity(regions.len());
        for region in &regions {
            let at = (self.clock)();
            let record = self.recorder.record(region, at).with_context(|| {
                format!(
                    "failed to record '{}' detection on frame {}",
                    region.label,
                    frame.sequence()
                )
            })?;
            if record.dangerous() {
                log::warn!(
                    "dangerous object #{}: {} conf={:.2} box={:?}",
                    record.id(),
                    record.label(),
                    record.confidence(),
                    record.bbox()
                );
            }
            overlays.push(Overlay::for_region(region, record.dangerous()));
        }

        self.annotator.annotate(&mut frame, &overlays);
        let command = self.display.present(&frame, &overlays)?;
        self.frames_processed += 1;

        if command == DisplayCommand::Quit {
            log::info!("quit requested");
            return Ok(Some(StopReason::QuitRequested));
        }
        if self
            .interrupt
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            log::info!("interrupt received");
            return Ok(Some(StopReason::Interrupted));
        }
        Ok(None)
    }

    fn log_health(&mut self) {
        if self.last_health_log.elapsed() < HEALTH_LOG_INTERVAL {
            return;
        }
        let stats = self.source.stats();
        log::info!(
            "source={} frames={} records={} dangerous={}",
            stats.source,
            stats.frames_captured,
            self.recorder.written(),
            self.recorder.dangerous_written()
        );
        self.last_health_log = Instant::now();
    }

    /// Release everything the loop owns. Both close errors are attempted before reporting.
    fn stop(mut self) -> Result<()> {
        self.state = LoopState::Stopped;
        self.source.release();
        let display = self.display.close().context("failed to close display");
        let store = self.recorder.close().context("failed to close detection store");
        display.and(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::DangerClassifier;
    use crate::detect::{BoundingBox, DetectionRegion, ScriptedBackend, StubBackend};
    use crate::display::HeadlessSink;
    use crate::ingest::ScriptedSource;
    use crate::storage::InMemoryDetectionStore;

    fn recorder() -> DetectionRecorder<InMemoryDetectionStore> {
        DetectionRecorder::new(InMemoryDetectionStore::default(), DangerClassifier::default())
    }

    #[test]
    fn start_moves_to_running_once() -> Result<()> {
        let mut lp = DetectionLoop::new(
            Box::new(ScriptedSource::blank("t", 1, 8, 8)),
            Box::new(StubBackend::new()),
            recorder(),
            Box::new(HeadlessSink::new()),
        );
        assert_eq!(lp.state(), LoopState::Init);
        lp.start()?;
        assert_eq!(lp.state(), LoopState::Running);
        assert!(lp.start().is_err());
        Ok(())
    }

    #[test]
    fn run_counts_frames_and_records() -> Result<()> {
        let region = DetectionRegion::new("scissors", 0.6, BoundingBox::new(1, 1, 4, 4));
        let summary = DetectionLoop::new(
            Box::new(ScriptedSource::blank("t", 3, 8, 8)),
            Box::new(ScriptedBackend::new(vec![
                vec![region.clone(), region.clone()],
                vec![],
                vec![region],
            ])),
            recorder(),
            Box::new(HeadlessSink::new()),
        )
        .run()?;

        assert_eq!(summary.frames_processed, 3);
        assert_eq!(summary.records_written, 3);
        assert_eq!(summary.dangerous_records, 3);
        assert_eq!(summary.stop_reason, StopReason::EndOfStream);
        Ok(())
    }

    #[test]
    fn raised_interrupt_stops_after_current_frame() -> Result<()> {
        let flag = Arc::new(AtomicBool::new(true));
        let summary = DetectionLoop::new(
            Box::new(ScriptedSource::blank("t", 5, 8, 8)),
            Box::new(StubBackend::new()),
            recorder(),
            Box::new(HeadlessSink::new()),
        )
        .with_interrupt(flag)
        .run()?;

        assert_eq!(summary.frames_processed, 1);
        assert_eq!(summary.stop_reason, StopReason::Interrupted);
        Ok(())
    }
}
