//! Frame ingestion sources.
//!
//! Sources produce timestamped RGB frames for the monitor loop:
//! - `stub://` synthetic source (testing, always available)
//! - RTSP / RTMP / V4L2 webcam via GStreamer (feature: ingest-gstreamer)
//!
//! The ingestion layer is responsible for decoding, frame pacing, and
//! stamping monotonic timestamps; frames are handed to the pipeline in
//! non-decreasing timestamp order.

pub mod stream;

pub use stream::{StreamConfig, StreamSource, StreamStats};
