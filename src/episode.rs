//! Episode and artifact records.
//!
//! An episode is one continuous span of cat presence, from debounced start to
//! debounced end. A single episode may span several recorded artifacts (a
//! mid-episode mode switch closes one artifact and opens another under the
//! same episode).

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::recording::RecorderMode;
use crate::tracker::EpisodeId;

/// Metadata for one recorded output unit (a video file or a photo session
/// directory), produced by the recorder when the artifact is finalized.
#[derive(Clone, Debug, Serialize)]
pub struct ArtifactMetadata {
    pub path: PathBuf,
    pub mode: RecorderMode,
    /// Frames written (video) or photos saved (photo mode).
    pub frames_written: u64,
    /// Covered wall time in seconds, from first to last written frame.
    pub duration_s: f64,
    /// Mean per-frame detection confidence over written frames.
    pub average_confidence: f32,
}

/// One presence episode. At most one episode is open at any time; this is
/// the invariant the whole pipeline protects.
#[derive(Clone, Debug, Serialize)]
pub struct Episode {
    pub id: EpisodeId,
    /// Monotonic stream timestamp of the frame that opened the episode.
    pub start_time: Duration,
    /// Set when the episode closes; `None` only while open.
    pub end_time: Option<Duration>,
    /// Recording mode the episode started in.
    pub mode: RecorderMode,
    /// Artifact fragments, in recording order. Empty when recording never
    /// succeeded during the episode.
    pub artifacts: Vec<ArtifactMetadata>,
    /// True when any recorder call failed during the episode, i.e. the
    /// artifact list does not cover the full presence span.
    pub recording_degraded: bool,
}

impl Episode {
    pub fn open(id: EpisodeId, start_time: Duration, mode: RecorderMode) -> Self {
        Self {
            id,
            start_time,
            end_time: None,
            mode,
            artifacts: Vec::new(),
            recording_degraded: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    /// Episode duration; `None` while still open.
    pub fn duration(&self) -> Option<Duration> {
        self.end_time
            .map(|end| end.saturating_sub(self.start_time))
    }
}
