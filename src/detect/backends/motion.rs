use anyhow::{anyhow, Result};

use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection, DetectionLabel};
use crate::frame::Frame;

const DEFAULT_CELL_SIZE: u32 = 16;
const DEFAULT_DIFF_THRESHOLD: u8 = 12;

/// CPU motion detector based on frame differencing over a coarse cell grid.
///
/// Each frame is reduced to per-cell mean luma; cells whose mean moved more
/// than `diff_threshold` against the previous frame are marked changed, and a
/// single detection covering the bounding box of changed cells is emitted.
/// Confidence is the density of changed cells inside that box.
///
/// This backend has no idea what a cat looks like; it exists so the pipeline
/// runs end-to-end without a model. Deployments that need classification use
/// the `backend-tract` ONNX backend.
pub struct MotionDetector {
    cell_size: u32,
    diff_threshold: u8,
    prev: Option<CellGrid>,
}

struct CellGrid {
    cols: u32,
    rows: u32,
    means: Vec<u8>,
}

impl MotionDetector {
    pub fn new() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            diff_threshold: DEFAULT_DIFF_THRESHOLD,
            prev: None,
        }
    }

    pub fn with_cell_size(mut self, cell_size: u32) -> Self {
        self.cell_size = cell_size.max(1);
        self
    }

    pub fn with_diff_threshold(mut self, diff_threshold: u8) -> Self {
        self.diff_threshold = diff_threshold;
        self
    }

    fn grid_for(&self, frame: &Frame) -> Result<CellGrid> {
        if frame.data().len() != frame.expected_len() {
            return Err(anyhow!(
                "frame buffer has {} bytes, expected {} for {}x{} RGB",
                frame.data().len(),
                frame.expected_len(),
                frame.width,
                frame.height
            ));
        }

        let cols = frame.width.div_ceil(self.cell_size);
        let rows = frame.height.div_ceil(self.cell_size);
        let mut means = vec![0u8; (cols * rows) as usize];

        for cy in 0..rows {
            for cx in 0..cols {
                let x0 = cx * self.cell_size;
                let y0 = cy * self.cell_size;
                let x1 = (x0 + self.cell_size).min(frame.width);
                let y1 = (y0 + self.cell_size).min(frame.height);

                let mut sum = 0u64;
                let mut count = 0u64;
                for y in y0..y1 {
                    let row = (y * frame.width) as usize * 3;
                    for x in x0..x1 {
                        let idx = row + x as usize * 3;
                        let px = &frame.data()[idx..idx + 3];
                        // Integer luma approximation: (r + 2g + b) / 4.
                        let luma =
                            (px[0] as u32 + 2 * px[1] as u32 + px[2] as u32) / 4;
                        sum += luma as u64;
                        count += 1;
                    }
                }
                means[(cy * cols + cx) as usize] =
                    if count > 0 { (sum / count) as u8 } else { 0 };
            }
        }

        Ok(CellGrid { cols, rows, means })
    }
}

impl Default for MotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for MotionDetector {
    fn name(&self) -> &'static str {
        "motion"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
        let grid = self.grid_for(frame)?;

        let Some(prev) = self.prev.as_ref() else {
            self.prev = Some(grid);
            return Ok(vec![]);
        };

        if prev.cols != grid.cols || prev.rows != grid.rows {
            // Frame geometry changed mid-stream; restart the baseline.
            self.prev = Some(grid);
            return Ok(vec![]);
        }

        let mut min_cx = u32::MAX;
        let mut min_cy = u32::MAX;
        let mut max_cx = 0u32;
        let mut max_cy = 0u32;
        let mut changed = 0u32;

        for cy in 0..grid.rows {
            for cx in 0..grid.cols {
                let idx = (cy * grid.cols + cx) as usize;
                let delta = grid.means[idx].abs_diff(prev.means[idx]);
                if delta > self.diff_threshold {
                    changed += 1;
                    min_cx = min_cx.min(cx);
                    min_cy = min_cy.min(cy);
                    max_cx = max_cx.max(cx);
                    max_cy = max_cy.max(cy);
                }
            }
        }

        self.prev = Some(grid);

        if changed == 0 {
            return Ok(vec![]);
        }

        let x = (min_cx * self.cell_size) as f32;
        let y = (min_cy * self.cell_size) as f32;
        let w = (((max_cx + 1) * self.cell_size).min(frame.width) as f32) - x;
        let h = (((max_cy + 1) * self.cell_size).min(frame.height) as f32) - y;

        let box_cells = (max_cx - min_cx + 1) * (max_cy - min_cy + 1);
        let confidence = (changed as f32 / box_cells as f32).clamp(0.0, 1.0);

        Ok(vec![Detection::new(
            BoundingBox::new(x, y, w, h),
            confidence,
            DetectionLabel::Motion,
        )])
    }
}
