//! Recording lifecycle controller.
//!
//! Translates presence transitions into recorder lifecycle calls and
//! assembles the closed `Episode`. The controller deliberately separates
//! "logically present" from "actively recording": an episode stays open even
//! when the recorder cannot produce an artifact, and such episodes are
//! reported with a degraded flag instead of being dropped.

use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::episode::Episode;
use crate::frame::Frame;
use crate::recording::recorder::{Recorder, RecorderHandle, RecorderMode};
use crate::tracker::EpisodeId;

/// Drives the recorder through episode lifecycles. Holds the single
/// open-episode slot, so at most one episode can be recording at a time.
pub struct RecordingController {
    recorder: Box<dyn Recorder>,
    mode: RecorderMode,
    photo_sample_interval: u32,
    open: Option<OpenRecording>,
}

struct OpenRecording {
    episode: Episode,
    /// `None` while in the degraded "untracked" sub-state: the episode is
    /// logically open but no artifact is; `begin` is retried per frame.
    handle: Option<RecorderHandle>,
    /// Frames seen since the last photo write (photo mode sampling).
    frames_since_write: u32,
}

impl RecordingController {
    pub fn new(
        recorder: Box<dyn Recorder>,
        default_mode: RecorderMode,
        photo_sample_interval: u32,
    ) -> Result<Self> {
        if photo_sample_interval == 0 {
            return Err(anyhow!("photo_sample_interval must be >= 1"));
        }
        Ok(Self {
            recorder,
            mode: default_mode,
            photo_sample_interval,
            open: None,
        })
    }

    /// Current mode: the open artifact's mode, or the mode the next episode
    /// will start in.
    pub fn mode(&self) -> RecorderMode {
        self.open
            .as_ref()
            .and_then(|open| open.handle.as_ref())
            .map(|handle| handle.mode())
            .unwrap_or(self.mode)
    }

    pub fn has_open_episode(&self) -> bool {
        self.open.is_some()
    }

    /// Begin a new episode at the given frame. The triggering frame is the
    /// first frame of the artifact.
    ///
    /// A `begin` failure does not drop the episode: it opens degraded and the
    /// controller retries on subsequent frames.
    pub fn start_episode(&mut self, id: EpisodeId, frame: &Frame, confidence: f32) {
        debug_assert!(self.open.is_none(), "episode {} started while one is open", id);

        let mut open = OpenRecording {
            episode: Episode::open(id, frame.timestamp, self.mode),
            handle: None,
            frames_since_write: 0,
        };

        let tracked = match self.recorder.begin(self.mode) {
            Ok(handle) => {
                log::info!("{}: recording started in {} mode", id, handle.mode());
                open.handle = Some(handle);
                true
            }
            Err(e) => {
                log::warn!("{}: recorder begin failed, episode untracked: {}", id, e);
                open.episode.recording_degraded = true;
                false
            }
        };

        self.open = Some(open);
        if tracked {
            self.write_frame(frame, confidence);
        }
    }

    /// Feed one frame while an episode is open. No-op when none is.
    ///
    /// Video mode writes every frame; photo mode writes one frame per
    /// `photo_sample_interval`. While untracked, this retries `begin`
    /// (one attempt per frame) before writing.
    pub fn record_frame(&mut self, frame: &Frame, confidence: f32) {
        let Some(open) = self.open.as_mut() else {
            return;
        };

        if open.handle.is_none() {
            match self.recorder.begin(self.mode) {
                Ok(handle) => {
                    log::info!(
                        "{}: recording recovered in {} mode",
                        open.episode.id,
                        handle.mode()
                    );
                    open.handle = Some(handle);
                    open.frames_since_write = 0;
                }
                Err(e) => {
                    log::debug!("{}: recorder begin retry failed: {}", open.episode.id, e);
                    return;
                }
            }
        }

        self.write_frame(frame, confidence);
    }

    /// Write one frame to the open artifact, honoring photo sampling.
    /// Callers guarantee an episode is open with a live handle.
    fn write_frame(&mut self, frame: &Frame, confidence: f32) {
        let Some(open) = self.open.as_mut() else {
            return;
        };
        let Some(handle) = open.handle.as_ref() else {
            return;
        };

        let due = match handle.mode() {
            RecorderMode::Video => true,
            RecorderMode::Photo => open.frames_since_write == 0,
        };
        open.frames_since_write = (open.frames_since_write + 1) % self.photo_sample_interval;

        if !due {
            return;
        }

        if let Err(e) = self.recorder.write(handle, frame, confidence) {
            log::warn!(
                "{}: recorder write failed, closing artifact: {}",
                open.episode.id,
                e
            );
            open.episode.recording_degraded = true;
            let handle = open.handle.take().expect("handle checked above");
            match self.recorder.end(handle) {
                Ok(meta) => open.episode.artifacts.push(meta),
                Err(e) => log::warn!(
                    "{}: failed to finalize artifact after write error: {}",
                    open.episode.id,
                    e
                ),
            }
        }
    }

    /// Switch recording mode. Outside an episode this only changes the mode
    /// the next episode will start in.
    ///
    /// Mid-episode, the current artifact is closed cleanly and a new one is
    /// opened in the new mode under the same episode; no presence event is
    /// involved. A failed re-open degrades the episode to the untracked
    /// sub-state, same as a start-time failure.
    pub fn switch_mode(&mut self, new_mode: RecorderMode) {
        if new_mode == self.mode {
            return;
        }
        self.mode = new_mode;

        let Some(open) = self.open.as_mut() else {
            log::info!("recorder mode set to {}", new_mode);
            return;
        };

        if let Some(handle) = open.handle.take() {
            match self.recorder.end(handle) {
                Ok(meta) => open.episode.artifacts.push(meta),
                Err(e) => {
                    log::warn!(
                        "{}: failed to finalize artifact on mode switch: {}",
                        open.episode.id,
                        e
                    );
                    open.episode.recording_degraded = true;
                }
            }
        }

        match self.recorder.begin(new_mode) {
            Ok(handle) => {
                log::info!(
                    "{}: mode switched to {}, new artifact open",
                    open.episode.id,
                    new_mode
                );
                open.handle = Some(handle);
                open.frames_since_write = 0;
            }
            Err(e) => {
                log::warn!(
                    "{}: recorder begin failed after mode switch, episode untracked: {}",
                    open.episode.id,
                    e
                );
                open.episode.recording_degraded = true;
            }
        }
    }

    /// Close the open episode at the given stream time, finalizing any open
    /// artifact. Returns the closed episode for notification, or `None` when
    /// no episode was open.
    ///
    /// Used both for debounced episode ends and for forced shutdown closure;
    /// either way the returned episode is well-formed (possibly with an
    /// empty artifact list, flagged degraded).
    pub fn close_episode(&mut self, end_time: Duration) -> Option<Episode> {
        let mut open = self.open.take()?;

        if let Some(handle) = open.handle.take() {
            match self.recorder.end(handle) {
                Ok(meta) => open.episode.artifacts.push(meta),
                Err(e) => {
                    log::warn!(
                        "{}: failed to finalize artifact at episode end: {}",
                        open.episode.id,
                        e
                    );
                    open.episode.recording_degraded = true;
                }
            }
        }

        open.episode.end_time = Some(end_time);
        log::info!(
            "{}: episode closed, {} artifact(s){}",
            open.episode.id,
            open.episode.artifacts.len(),
            if open.episode.recording_degraded {
                " (degraded)"
            } else {
                ""
            }
        );
        Some(open.episode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::memory::MemoryRecorder;

    fn frame(ts_ms: u64) -> Frame {
        Frame::new(vec![0u8; 12], 2, 2, Duration::from_millis(ts_ms))
    }

    fn controller(mode: RecorderMode, interval: u32) -> (RecordingController, MemoryRecorder) {
        let recorder = MemoryRecorder::new();
        let probe = recorder.clone();
        let controller =
            RecordingController::new(Box::new(recorder), mode, interval).unwrap();
        (controller, probe)
    }

    #[test]
    fn zero_photo_interval_is_rejected() {
        let recorder = MemoryRecorder::new();
        assert!(RecordingController::new(Box::new(recorder), RecorderMode::Photo, 0).is_err());
    }

    #[test]
    fn video_episode_writes_every_frame() {
        let (mut c, probe) = controller(RecorderMode::Video, 1);

        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        for i in 1..5u64 {
            c.record_frame(&frame(i * 100), 0.8);
        }
        let ep = c.close_episode(Duration::from_millis(500)).unwrap();

        assert_eq!(ep.artifacts.len(), 1);
        assert_eq!(ep.artifacts[0].frames_written, 5);
        assert!(!ep.recording_degraded);
        assert_eq!(ep.end_time, Some(Duration::from_millis(500)));
        assert_eq!(probe.open_sessions(), 0);
    }

    #[test]
    fn photo_episode_samples_on_interval() {
        let (mut c, _probe) = controller(RecorderMode::Photo, 3);

        // Frames 0..=6: writes expected on frames 0, 3, 6.
        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        for i in 1..7u64 {
            c.record_frame(&frame(i * 100), 0.8);
        }
        let ep = c.close_episode(Duration::from_millis(700)).unwrap();

        assert_eq!(ep.artifacts.len(), 1);
        assert_eq!(ep.artifacts[0].frames_written, 3);
    }

    #[test]
    fn begin_failure_keeps_episode_open_and_retries() {
        // begin fails at start, succeeds two frames later.
        let (mut c, probe) = controller(RecorderMode::Video, 1);
        probe.fail_begin(2);

        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        assert!(c.has_open_episode());

        c.record_frame(&frame(100), 0.8); // retry fails
        c.record_frame(&frame(200), 0.8); // retry succeeds, writes
        c.record_frame(&frame(300), 0.8);
        let ep = c.close_episode(Duration::from_millis(400)).unwrap();

        assert!(ep.recording_degraded);
        assert_eq!(ep.artifacts.len(), 1);
        // Artifact only covers frames after the successful begin.
        assert_eq!(ep.artifacts[0].frames_written, 2);
    }

    #[test]
    fn episode_with_no_artifact_is_still_reported_degraded() {
        let (mut c, probe) = controller(RecorderMode::Video, 1);
        probe.fail_begin(u32::MAX);

        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        c.record_frame(&frame(100), 0.8);
        let ep = c.close_episode(Duration::from_millis(200)).unwrap();

        assert!(ep.recording_degraded);
        assert!(ep.artifacts.is_empty());
        assert_eq!(ep.end_time, Some(Duration::from_millis(200)));
    }

    #[test]
    fn mode_switch_mid_episode_produces_two_fragments() {
        let (mut c, probe) = controller(RecorderMode::Video, 1);

        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        c.record_frame(&frame(100), 0.8);
        c.switch_mode(RecorderMode::Photo);
        c.record_frame(&frame(200), 0.8);
        let ep = c.close_episode(Duration::from_millis(300)).unwrap();

        assert_eq!(ep.artifacts.len(), 2);
        assert_eq!(ep.artifacts[0].mode, RecorderMode::Video);
        assert_eq!(ep.artifacts[1].mode, RecorderMode::Photo);
        assert!(!ep.recording_degraded);
        // Exactly one begin per fragment.
        assert_eq!(probe.begin_calls(), 2);
    }

    #[test]
    fn mode_switch_outside_episode_only_changes_default() {
        let (mut c, probe) = controller(RecorderMode::Video, 1);

        c.switch_mode(RecorderMode::Photo);
        assert_eq!(c.mode(), RecorderMode::Photo);
        assert_eq!(probe.begin_calls(), 0);

        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        let ep = c.close_episode(Duration::from_millis(100)).unwrap();
        assert_eq!(ep.mode, RecorderMode::Photo);
    }

    #[test]
    fn switch_to_same_mode_is_a_noop() {
        let (mut c, probe) = controller(RecorderMode::Video, 1);
        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        c.switch_mode(RecorderMode::Video);
        let ep = c.close_episode(Duration::from_millis(100)).unwrap();
        assert_eq!(ep.artifacts.len(), 1);
        assert_eq!(probe.begin_calls(), 1);
    }

    #[test]
    fn write_failure_degrades_and_recovers() {
        let (mut c, probe) = controller(RecorderMode::Video, 1);

        c.start_episode(EpisodeId(1), &frame(0), 0.9);
        probe.fail_next_write();
        c.record_frame(&frame(100), 0.8); // write fails, artifact closed
        c.record_frame(&frame(200), 0.8); // begin retried, new artifact
        let ep = c.close_episode(Duration::from_millis(300)).unwrap();

        assert!(ep.recording_degraded);
        assert_eq!(ep.artifacts.len(), 2);
        assert_eq!(ep.artifacts[0].frames_written, 1);
        assert_eq!(ep.artifacts[1].frames_written, 1);
    }

    #[test]
    fn close_without_open_episode_returns_none() {
        let (mut c, _probe) = controller(RecorderMode::Video, 1);
        assert!(c.close_episode(Duration::ZERO).is_none());
    }

    #[test]
    fn artifact_metadata_averages_confidence() {
        let (mut c, _probe) = controller(RecorderMode::Video, 1);
        c.start_episode(EpisodeId(1), &frame(0), 1.0);
        c.record_frame(&frame(100), 0.5);
        let ep = c.close_episode(Duration::from_millis(200)).unwrap();
        assert!((ep.artifacts[0].average_confidence - 0.75).abs() < 1e-6);
    }
}
