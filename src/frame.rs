//! Timestamped frame container.
//!
//! A `Frame` is an immutable RGB8 buffer with a monotonic capture timestamp.
//! Frames are owned transiently by the monitor loop: the core reads their
//! dimensions and timestamp and forwards them to the recorder, but never
//! caches them beyond the current processing step.

use std::time::Duration;

/// One captured frame. Pixel data is tightly packed RGB8, row-major.
pub struct Frame {
    data: Vec<u8>,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Monotonic capture timestamp, measured from stream start.
    ///
    /// Sources must hand frames to the pipeline in non-decreasing timestamp
    /// order; that ordering is a caller contract, not something the core
    /// repairs.
    pub timestamp: Duration,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, timestamp: Duration) -> Self {
        Self {
            data,
            width,
            height,
            timestamp,
        }
    }

    /// Raw RGB8 pixel bytes (len == width * height * 3 for well-formed frames).
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Expected byte length for the frame's dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("timestamp", &self.timestamp)
            .field("bytes", &self.data.len())
            .finish()
    }
}
