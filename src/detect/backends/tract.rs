#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionLabel};
use crate::frame::Frame;

/// COCO class index for "cat" in the usual 80-class export.
const DEFAULT_CAT_CLASS: usize = 15;

/// Tract-based ONNX object detector.
///
/// Loads a local single-shot detection model and decodes its output into cat
/// detections. The expected output layout is rows of
/// `[cx, cy, w, h, score, class_id, ...]` with coordinates normalized to the
/// model input size; this matches the common exported-YOLO head shape. Only
/// rows classified as the configured cat class are emitted.
pub struct TractDetector {
    model: TypedRunnableModel<TypedModel>,
    width: u32,
    height: u32,
    score_threshold: f32,
    cat_class: usize,
}

impl TractDetector {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
            score_threshold: 0.25,
            cat_class: DEFAULT_CAT_CLASS,
        })
    }

    /// Override the default score threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.score_threshold = threshold;
        self
    }

    /// Override the class index treated as "cat".
    pub fn with_cat_class(mut self, cat_class: usize) -> Self {
        self.cat_class = cat_class;
        self
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        if frame.width != self.width || frame.height != self.height {
            return Err(anyhow!(
                "frame size {}x{} does not match model input {}x{}",
                frame.width,
                frame.height,
                self.width,
                self.height
            ));
        }
        if frame.data().len() != frame.expected_len() {
            return Err(anyhow!(
                "expected {} RGB bytes, received {}",
                frame.expected_len(),
                frame.data().len()
            ));
        }

        let width = self.width as usize;
        let pixels = frame.data();
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, width),
            |(_, channel, y, x)| {
                let idx = (y * width + x) * 3 + channel;
                pixels[idx] as f32 / 255.0
            },
        );

        Ok(input.into_tensor())
    }

    fn decode_output(&self, outputs: TVec<TValue>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;

        let row_len = *view
            .shape()
            .last()
            .ok_or_else(|| anyhow!("model output has no shape"))?;
        if row_len < 6 {
            return Err(anyhow!(
                "model output rows have {} fields, need at least 6",
                row_len
            ));
        }

        let flat: Vec<f32> = view.iter().copied().collect();
        let mut detections = Vec::new();

        for row in flat.chunks_exact(row_len) {
            let score = row[4];
            let class_id = row[5] as usize;
            if score < self.score_threshold || class_id != self.cat_class {
                continue;
            }

            let cx = row[0] * self.width as f32;
            let cy = row[1] * self.height as f32;
            let w = row[2] * self.width as f32;
            let h = row[3] * self.height as f32;

            detections.push(Detection::new(
                BoundingBox::new(cx - w / 2.0, cy - h / 2.0, w, h),
                score.clamp(0.0, 1.0),
                DetectionLabel::Cat,
            ));
        }

        Ok(detections)
    }
}

impl Detector for TractDetector {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode_output(outputs)
    }
}
