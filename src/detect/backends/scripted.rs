use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionLabel};
use crate::frame::Frame;

/// One scripted step for the test detector.
#[derive(Clone, Debug)]
pub enum ScriptedStep {
    /// Return these detections.
    Detections(Vec<Detection>),
    /// Fail the inference call (exercises the treat-as-miss recovery path).
    Fail,
}

impl ScriptedStep {
    /// A single cat detection with the given confidence, box placement is
    /// arbitrary but inside a 640x480 frame.
    pub fn cat(confidence: f32) -> Self {
        ScriptedStep::Detections(vec![Detection::new(
            BoundingBox::new(100.0, 100.0, 120.0, 90.0),
            confidence,
            DetectionLabel::Cat,
        )])
    }

    /// No detections this frame.
    pub fn none() -> Self {
        ScriptedStep::Detections(vec![])
    }
}

/// Deterministic detector for tests: replays a fixed script, then reports
/// empty frames forever.
pub struct ScriptedDetector {
    script: VecDeque<ScriptedStep>,
}

impl ScriptedDetector {
    pub fn new(steps: Vec<ScriptedStep>) -> Self {
        Self {
            script: steps.into(),
        }
    }

    /// Script from a hit pattern: `true` becomes one confident cat detection,
    /// `false` an empty frame.
    pub fn from_hits(hits: &[bool], confidence: f32) -> Self {
        Self::new(
            hits.iter()
                .map(|&hit| {
                    if hit {
                        ScriptedStep::cat(confidence)
                    } else {
                        ScriptedStep::none()
                    }
                })
                .collect(),
        )
    }
}

impl Detector for ScriptedDetector {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        match self.script.pop_front() {
            Some(ScriptedStep::Detections(dets)) => Ok(dets),
            Some(ScriptedStep::Fail) => Err(anyhow!("scripted inference failure")),
            None => Ok(vec![]),
        }
    }
}
