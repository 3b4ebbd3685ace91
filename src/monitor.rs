//! Frame-processing context.
//!
//! `Monitor` owns the per-run pipeline state (detector, mask, tracker,
//! recording controller, notifier) as one explicit context object. Exactly
//! one frame is fully processed per `process_frame` call: detect → mask
//! filter → confidence gate → tracker update → controller action → (on
//! episode close) notification. Nothing here blocks; only the detector and
//! recorder boundaries may.

use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::Detector;
use crate::frame::Frame;
use crate::mask::RegionMask;
use crate::notify::Notifier;
use crate::recording::{RecorderMode, RecordingController};
use crate::tracker::{PresenceTracker, Transition};

/// Per-frame processing summary, for periodic health logging.
#[derive(Clone, Copy, Debug)]
pub struct FrameReport {
    /// Raw detection candidates this frame.
    pub detections: usize,
    /// Candidates surviving the region mask.
    pub accepted: usize,
    /// Aggregate hit signal fed to the tracker.
    pub hit: bool,
    pub transition: Option<Transition>,
}

pub struct Monitor {
    detector: Box<dyn Detector>,
    mask: RegionMask,
    min_confidence: f32,
    tracker: PresenceTracker,
    controller: RecordingController,
    notifier: Box<dyn Notifier>,
    last_timestamp: Option<Duration>,
    frames_processed: u64,
    episodes_closed: u64,
}

impl Monitor {
    pub fn new(
        detector: Box<dyn Detector>,
        mask: RegionMask,
        min_confidence: f32,
        tracker: PresenceTracker,
        controller: RecordingController,
        notifier: Box<dyn Notifier>,
    ) -> Self {
        Self {
            detector,
            mask,
            min_confidence,
            tracker,
            controller,
            notifier,
            last_timestamp: None,
            frames_processed: 0,
            episodes_closed: 0,
        }
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn episodes_closed(&self) -> u64 {
        self.episodes_closed
    }

    /// Process one frame through the full pipeline.
    ///
    /// Frames must arrive in non-decreasing timestamp order; violating that
    /// is a caller bug, reported as an error rather than silently repaired.
    /// Detector failures are absorbed as a miss so debounce counters stay
    /// meaningful; recorder failures are absorbed by the controller.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        if let Some(last) = self.last_timestamp {
            if frame.timestamp < last {
                return Err(anyhow!(
                    "frame timestamps must be non-decreasing ({:?} after {:?})",
                    frame.timestamp,
                    last
                ));
            }
        }
        self.last_timestamp = Some(frame.timestamp);
        self.frames_processed += 1;

        let raw = match self.detector.detect(frame) {
            Ok(detections) => detections,
            Err(e) => {
                log::warn!("detection failed, treating frame as a miss: {}", e);
                Vec::new()
            }
        };
        let raw_count = raw.len();

        let accepted = self.mask.filter(raw);
        let best_confidence = accepted
            .iter()
            .map(|d| d.confidence)
            .filter(|&c| c >= self.min_confidence)
            .fold(None::<f32>, |best, c| Some(best.map_or(c, |b| b.max(c))));
        let hit = best_confidence.is_some();

        let transition = self.tracker.update(hit);
        match transition {
            Some(Transition::EpisodeStarted(id)) => {
                log::info!("{}: cat present at {:?}", id, frame.timestamp);
                self.controller
                    .start_episode(id, frame, best_confidence.unwrap_or(0.0));
            }
            Some(Transition::EpisodeEnded(id)) => {
                log::info!("{}: cat absent at {:?}", id, frame.timestamp);
                self.close_and_notify(frame.timestamp);
            }
            None => {
                self.controller
                    .record_frame(frame, best_confidence.unwrap_or(0.0));
            }
        }

        Ok(FrameReport {
            detections: raw_count,
            accepted: accepted.len(),
            hit,
            transition,
        })
    }

    /// Switch recording mode (video <-> photo). Mid-episode this rolls the
    /// artifact under the same episode; it never emits presence events.
    pub fn switch_mode(&mut self, mode: RecorderMode) {
        self.controller.switch_mode(mode);
    }

    pub fn mode(&self) -> RecorderMode {
        self.controller.mode()
    }

    /// Forced-closure path for shutdown: ends any open episode and reports
    /// it before returning. Safe to call repeatedly.
    pub fn shutdown(&mut self) {
        if let Some(Transition::EpisodeEnded(id)) = self.tracker.force_end() {
            log::info!("{}: episode force-closed at shutdown", id);
            let end_time = self.last_timestamp.unwrap_or(Duration::ZERO);
            self.close_and_notify(end_time);
        }
    }

    fn close_and_notify(&mut self, end_time: Duration) {
        if let Some(episode) = self.controller.close_episode(end_time) {
            self.episodes_closed += 1;
            self.notifier.on_episode_closed(&episode);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{ScriptedDetector, ScriptedStep};
    use crate::notify::MemoryNotifier;
    use crate::recording::MemoryRecorder;

    fn frame(ts_ms: u64) -> Frame {
        Frame::new(vec![0u8; 12], 2, 2, Duration::from_millis(ts_ms))
    }

    fn monitor_with(
        detector: ScriptedDetector,
        recorder: MemoryRecorder,
        notifier: MemoryNotifier,
        hits_to_start: u32,
        misses_to_end: u32,
    ) -> Monitor {
        Monitor::new(
            Box::new(detector),
            RegionMask::accept_all(),
            0.25,
            PresenceTracker::new(hits_to_start, misses_to_end).unwrap(),
            RecordingController::new(Box::new(recorder), RecorderMode::Video, 1).unwrap(),
            Box::new(notifier),
        )
    }

    fn run(monitor: &mut Monitor, frames: usize) {
        for i in 0..frames {
            monitor.process_frame(&frame(i as u64 * 100)).unwrap();
        }
    }

    #[test]
    fn detection_error_counts_as_miss() {
        // Hits interleaved with failures never reach three consecutive hits.
        let detector = ScriptedDetector::new(vec![
            ScriptedStep::cat(0.9),
            ScriptedStep::cat(0.9),
            ScriptedStep::Fail,
            ScriptedStep::cat(0.9),
            ScriptedStep::cat(0.9),
            ScriptedStep::Fail,
        ]);
        let notifier = MemoryNotifier::new();
        let mut monitor =
            monitor_with(detector, MemoryRecorder::new(), notifier.clone(), 3, 5);

        run(&mut monitor, 6);
        assert!(notifier.closed().is_empty());
        assert_eq!(monitor.episodes_closed(), 0);
    }

    #[test]
    fn low_confidence_detections_do_not_count_as_hits() {
        let detector = ScriptedDetector::new(vec![
            ScriptedStep::cat(0.1),
            ScriptedStep::cat(0.1),
            ScriptedStep::cat(0.1),
        ]);
        let notifier = MemoryNotifier::new();
        let mut monitor =
            monitor_with(detector, MemoryRecorder::new(), notifier.clone(), 1, 1);

        run(&mut monitor, 3);
        assert!(notifier.closed().is_empty());
    }

    #[test]
    fn full_episode_flows_to_notifier() {
        // 3 hits, then 5 misses: one complete visit.
        let detector = ScriptedDetector::from_hits(
            &[true, true, true, false, false, false, false, false],
            0.9,
        );
        let notifier = MemoryNotifier::new();
        let mut monitor =
            monitor_with(detector, MemoryRecorder::new(), notifier.clone(), 3, 5);

        run(&mut monitor, 8);

        let closed = notifier.closed();
        assert_eq!(closed.len(), 1);
        let ep = &closed[0];
        // Episode starts on the third hit (frame 2) and ends on the fifth
        // consecutive miss (frame 7).
        assert_eq!(ep.start_time, Duration::from_millis(200));
        assert_eq!(ep.end_time, Some(Duration::from_millis(700)));
        assert!(!ep.recording_degraded);
        assert_eq!(ep.artifacts.len(), 1);
        // Frames 2..=6 are written; the ending frame is not.
        assert_eq!(ep.artifacts[0].frames_written, 5);
    }

    #[test]
    fn out_of_order_frames_are_rejected() {
        let detector = ScriptedDetector::from_hits(&[false, false], 0.9);
        let mut monitor = monitor_with(
            detector,
            MemoryRecorder::new(),
            MemoryNotifier::new(),
            3,
            5,
        );

        monitor.process_frame(&frame(500)).unwrap();
        assert!(monitor.process_frame(&frame(400)).is_err());
        // Equal timestamps are allowed.
        assert!(monitor.process_frame(&frame(500)).is_ok());
    }

    #[test]
    fn shutdown_mid_episode_closes_and_notifies_once() {
        // Shutdown arrives while PRESENT with zero prior misses.
        let detector = ScriptedDetector::from_hits(&[true, true, true, true], 0.9);
        let notifier = MemoryNotifier::new();
        let mut monitor =
            monitor_with(detector, MemoryRecorder::new(), notifier.clone(), 3, 5);

        run(&mut monitor, 4);
        assert!(notifier.closed().is_empty());

        monitor.shutdown();
        assert_eq!(notifier.closed().len(), 1);
        let ep = &notifier.closed()[0];
        assert_eq!(ep.end_time, Some(Duration::from_millis(300)));

        // Idempotent.
        monitor.shutdown();
        assert_eq!(notifier.closed().len(), 1);
    }

    #[test]
    fn masked_out_detections_never_start_an_episode() {
        use crate::detect::{BoundingBox, Detection, DetectionLabel};

        // Mask accepts only the left half of a 100x100 frame; all scripted
        // detections sit on the right.
        let mut cells = vec![false; 100 * 100];
        for y in 0..100usize {
            for x in 0..50usize {
                cells[y * 100 + x] = true;
            }
        }
        let mask = RegionMask::from_bitmap(cells, 100, 100, 0.5).unwrap();

        let right_box = || {
            ScriptedStep::Detections(vec![Detection::new(
                BoundingBox::new(70.0, 10.0, 20.0, 20.0),
                0.95,
                DetectionLabel::Cat,
            )])
        };
        let detector = ScriptedDetector::new(vec![right_box(), right_box(), right_box()]);
        let notifier = MemoryNotifier::new();
        let mut monitor = Monitor::new(
            Box::new(detector),
            mask,
            0.25,
            PresenceTracker::new(1, 1).unwrap(),
            RecordingController::new(Box::new(MemoryRecorder::new()), RecorderMode::Video, 1)
                .unwrap(),
            Box::new(notifier.clone()),
        );

        run(&mut monitor, 3);
        assert!(notifier.closed().is_empty());
    }
}
