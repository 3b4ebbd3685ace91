use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector trait for running inference on frames.
///
/// Implementations are stateless per call from the pipeline's point of view:
/// each `detect` produces fresh candidates for exactly one frame, with no
/// identity carried between calls. Backends may keep internal state (e.g. the
/// previous frame for differencing) but must not retain the pixel slice
/// beyond the call.
///
/// A failed `detect` is recovered by the monitor as "no detections this
/// frame" so the debounce counters stay meaningful; it is never fatal.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, returning zero or more candidates.
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
