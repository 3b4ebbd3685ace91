//! catwatch
//!
//! Watches a camera (or network stream) frame by frame, decides whether a
//! cat is present in a configured region of interest, and records evidence
//! of each presence episode.
//!
//! # Architecture
//!
//! The pipeline processes one frame at a time:
//!
//! ```text
//! frame -> Detector -> RegionMask filter -> PresenceTracker.update()
//!       -> (state, transitions) -> RecordingController -> Recorder I/O
//!                                                      -> Notifier
//! ```
//!
//! The core is the `PresenceTracker` state machine and the recording
//! lifecycle it drives: noisy per-frame detections are debounced into stable
//! PRESENT/ABSENT transitions (asymmetric hit/miss hysteresis), and exactly
//! one episode is open at any time. Every opened episode is eventually
//! closed, including at shutdown, and reported to the notifier.
//!
//! # Module Structure
//!
//! - `frame`: timestamped RGB frame container
//! - `ingest`: frame sources (synthetic stub, GStreamer streams)
//! - `detect`: detector boundary and backends
//! - `mask`: region-of-interest filtering
//! - `tracker`: debounced presence state machine
//! - `recording`: recorder boundary, lifecycle controller, disk recorder
//! - `episode`: episode and artifact records
//! - `notify`: episode notification sinks
//! - `monitor`: per-frame orchestration context
//! - `config`: file + env configuration

pub mod config;
pub mod detect;
pub mod episode;
pub mod frame;
pub mod ingest;
pub mod mask;
pub mod monitor;
pub mod notify;
pub mod recording;
pub mod tracker;

pub use config::{MaskMode, MonitorConfig};
pub use detect::{BoundingBox, Detection, DetectionLabel, Detector, MotionDetector};
pub use episode::{ArtifactMetadata, Episode};
pub use frame::Frame;
pub use ingest::{StreamConfig, StreamSource};
pub use mask::RegionMask;
pub use monitor::{FrameReport, Monitor};
pub use notify::{JsonLinesNotifier, Notifier, StdoutNotifier};
pub use recording::{
    DiskRecorder, Recorder, RecorderError, RecorderHandle, RecorderMode, RecordingController,
};
pub use tracker::{EpisodeId, PresenceStatus, PresenceTracker, Transition};
