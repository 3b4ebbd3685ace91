//! Object detection boundary.
//!
//! The pipeline treats the detector as an external collaborator: one frame
//! in, zero or more `{box, confidence}` candidates out. Backends:
//! - `motion`: CPU frame differencing, always available.
//! - `tract`: ONNX object detection (feature: backend-tract).
//! - `scripted`: deterministic replay for tests.

pub mod backend;
pub mod backends;
pub mod result;

use anyhow::{anyhow, Result};

pub use backend::Detector;
pub use backends::MotionDetector;
pub use backends::{ScriptedDetector, ScriptedStep};
#[cfg(feature = "backend-tract")]
pub use backends::TractDetector;
pub use result::{BoundingBox, Detection, DetectionLabel};

use crate::config::DetectorSettings;

/// Build a detector from configuration.
pub fn build_detector(settings: &DetectorSettings) -> Result<Box<dyn Detector>> {
    match settings.backend.as_str() {
        "motion" => Ok(Box::new(MotionDetector::new())),
        #[cfg(feature = "backend-tract")]
        "tract" => {
            let model_path = settings
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("detector backend 'tract' requires model_path"))?;
            let detector =
                TractDetector::new(model_path, settings.input_width, settings.input_height)?
                    .with_threshold(settings.min_confidence);
            Ok(Box::new(detector))
        }
        #[cfg(not(feature = "backend-tract"))]
        "tract" => Err(anyhow!(
            "detector backend 'tract' requires the backend-tract feature"
        )),
        other => Err(anyhow!("unknown detector backend '{}'", other)),
    }
}
