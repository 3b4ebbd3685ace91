//! Recorder boundary.
//!
//! The recorder is an external capability: it can open an output artifact,
//! append frames to it, and finalize it into metadata. Everything about
//! encoding and file layout lives behind this trait; the recording
//! controller only drives the lifecycle.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::episode::ArtifactMetadata;
use crate::frame::Frame;

/// Recording mode for capture artifacts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderMode {
    /// One video file per artifact.
    Video,
    /// A directory of sampled photos per artifact.
    Photo,
}

impl std::fmt::Display for RecorderMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderMode::Video => write!(f, "video"),
            RecorderMode::Photo => write!(f, "photo"),
        }
    }
}

impl FromStr for RecorderMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "video" => Ok(RecorderMode::Video),
            "photo" | "photos" => Ok(RecorderMode::Photo),
            other => Err(format!("unknown recorder mode '{}'", other)),
        }
    }
}

/// Recorder failure taxonomy.
///
/// `Unavailable` means the recorder could not open an artifact at all (disk
/// full, device busy); the controller reacts by keeping the episode logically
/// open and retrying. `Io` covers failures on an already-open artifact.
#[derive(Clone, Debug)]
pub enum RecorderError {
    Unavailable(String),
    Io(String),
}

impl std::fmt::Display for RecorderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecorderError::Unavailable(msg) => write!(f, "recorder unavailable: {}", msg),
            RecorderError::Io(msg) => write!(f, "recorder i/o error: {}", msg),
        }
    }
}

impl std::error::Error for RecorderError {}

/// Opaque handle for one open artifact.
///
/// `Recorder::end` consumes the handle, so a finalized artifact cannot be
/// written to or ended twice by construction.
#[derive(Debug)]
pub struct RecorderHandle {
    id: u64,
    mode: RecorderMode,
}

impl RecorderHandle {
    pub fn new(id: u64, mode: RecorderMode) -> Self {
        Self { id, mode }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn mode(&self) -> RecorderMode {
        self.mode
    }
}

/// External recording capability.
pub trait Recorder: Send {
    /// Open a new artifact in the given mode.
    fn begin(&mut self, mode: RecorderMode) -> Result<RecorderHandle, RecorderError>;

    /// Append one frame to an open artifact.
    ///
    /// `confidence` is the best accepted detection confidence for this frame
    /// (0.0 when the frame carried no accepted detection); recorders fold it
    /// into the artifact's average.
    fn write(
        &mut self,
        handle: &RecorderHandle,
        frame: &Frame,
        confidence: f32,
    ) -> Result<(), RecorderError>;

    /// Finalize an artifact, consuming its handle.
    fn end(&mut self, handle: RecorderHandle) -> Result<ArtifactMetadata, RecorderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_both_cli_spellings() {
        assert_eq!("video".parse::<RecorderMode>().unwrap(), RecorderMode::Video);
        assert_eq!("photos".parse::<RecorderMode>().unwrap(), RecorderMode::Photo);
        assert_eq!("Photo".parse::<RecorderMode>().unwrap(), RecorderMode::Photo);
        assert!("gif".parse::<RecorderMode>().is_err());
    }
}
