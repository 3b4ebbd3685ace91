//! Recording lifecycle.
//!
//! - `recorder`: the external recorder capability boundary.
//! - `controller`: episode-driven lifecycle logic (the core).
//! - `disk`: on-disk artifact recorder (photos; video via encode-ffmpeg).
//! - `memory`: in-memory recorder for tests.

pub mod controller;
pub mod disk;
pub mod memory;
pub mod recorder;
#[cfg(feature = "encode-ffmpeg")]
pub(crate) mod video_ffmpeg;

pub use controller::RecordingController;
pub use disk::DiskRecorder;
pub use memory::MemoryRecorder;
pub use recorder::{Recorder, RecorderError, RecorderHandle, RecorderMode};
