//! Region-of-interest mask.
//!
//! A `RegionMask` is a binary acceptance predicate over frame coordinates:
//! detections are kept only when their box substantially overlaps the
//! monitored region. The mask is immutable once built; reconfiguration is
//! reinitialization, never frame-by-frame mutation.

use std::path::Path;

use anyhow::{anyhow, Context, Result};

use crate::config::{MaskMode, MaskSettings};
use crate::detect::result::{BoundingBox, Detection};

pub const DEFAULT_OVERLAP_THRESHOLD: f32 = 0.5;

/// Spatial filter restricting detections to a configured area of the frame.
pub enum RegionMask {
    /// Accept every detection (no region configured).
    AcceptAll,
    /// Accept detections overlapping the bitmap by at least `threshold`.
    Bitmap(BitmapMask),
}

pub struct BitmapMask {
    cells: Vec<bool>,
    width: u32,
    height: u32,
    threshold: f32,
}

impl RegionMask {
    pub fn accept_all() -> Self {
        RegionMask::AcceptAll
    }

    /// Build a bitmap mask from per-pixel acceptance cells (row-major).
    pub fn from_bitmap(cells: Vec<bool>, width: u32, height: u32, threshold: f32) -> Result<Self> {
        if cells.len() != (width as usize) * (height as usize) {
            return Err(anyhow!(
                "mask bitmap has {} cells, expected {} for {}x{}",
                cells.len(),
                width as usize * height as usize,
                width,
                height
            ));
        }
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(anyhow!(
                "mask threshold must be in (0, 1], got {}",
                threshold
            ));
        }
        Ok(RegionMask::Bitmap(BitmapMask {
            cells,
            width,
            height,
            threshold,
        }))
    }

    /// Load a bitmap mask from a grayscale PNG: pixels brighter than 127 are
    /// accepted region. This is the on-disk format the mask tooling saves.
    pub fn from_png<P: AsRef<Path>>(path: P, threshold: f32) -> Result<Self> {
        let path = path.as_ref();
        let img = image::open(path)
            .with_context(|| format!("failed to load mask image {}", path.display()))?
            .into_luma8();
        let (width, height) = img.dimensions();
        let cells = img.pixels().map(|px| px.0[0] > 127).collect();
        Self::from_bitmap(cells, width, height, threshold)
    }

    pub fn from_settings(settings: &MaskSettings) -> Result<Self> {
        match settings.mode {
            MaskMode::All => Ok(RegionMask::AcceptAll),
            MaskMode::Bitmap => {
                let path = settings
                    .path
                    .as_ref()
                    .ok_or_else(|| anyhow!("mask mode 'bitmap' requires a mask path"))?;
                Self::from_png(path, settings.threshold)
            }
        }
    }

    /// Pure acceptance predicate: true when the box overlaps the accepted
    /// region by at least the configured fraction of the box's own area.
    ///
    /// Degenerate zero-area boxes and boxes entirely outside the mask bounds
    /// are always rejected.
    pub fn accepts(&self, bbox: &BoundingBox) -> bool {
        match self {
            RegionMask::AcceptAll => bbox.area() > 0.0,
            RegionMask::Bitmap(mask) => mask.accepts(bbox),
        }
    }

    /// Apply `accepts` to a frame's detection set.
    pub fn filter(&self, detections: Vec<Detection>) -> Vec<Detection> {
        detections
            .into_iter()
            .filter(|d| self.accepts(&d.bbox))
            .collect()
    }
}

impl BitmapMask {
    fn accepts(&self, bbox: &BoundingBox) -> bool {
        let area = bbox.area();
        if area <= 0.0 {
            return false;
        }

        // Clamp the box to mask bounds; a box entirely outside produces an
        // empty range and is rejected below.
        let x0 = bbox.x.max(0.0).floor() as u32;
        let y0 = bbox.y.max(0.0).floor() as u32;
        let x1 = (bbox.right().ceil().max(0.0) as u32).min(self.width);
        let y1 = (bbox.bottom().ceil().max(0.0) as u32).min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return false;
        }

        let mut accepted = 0u64;
        for y in y0..y1 {
            let row = (y * self.width) as usize;
            for x in x0..x1 {
                if self.cells[row + x as usize] {
                    accepted += 1;
                }
            }
        }

        accepted as f32 / area >= self.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 100x100 mask accepting the left half (x < 50).
    fn left_half_mask(threshold: f32) -> RegionMask {
        let mut cells = vec![false; 100 * 100];
        for y in 0..100usize {
            for x in 0..50usize {
                cells[y * 100 + x] = true;
            }
        }
        RegionMask::from_bitmap(cells, 100, 100, threshold).unwrap()
    }

    #[test]
    fn accept_all_keeps_everything_in_frame() {
        let mask = RegionMask::accept_all();
        assert!(mask.accepts(&BoundingBox::new(0.0, 0.0, 10.0, 10.0)));
        assert!(mask.accepts(&BoundingBox::new(-5.0, -5.0, 10.0, 10.0)));
    }

    #[test]
    fn zero_area_box_is_always_rejected() {
        let mask = RegionMask::accept_all();
        assert!(!mask.accepts(&BoundingBox::new(10.0, 10.0, 0.0, 10.0)));

        let mask = left_half_mask(0.5);
        assert!(!mask.accepts(&BoundingBox::new(10.0, 10.0, 0.0, 10.0)));
    }

    #[test]
    fn box_inside_accepted_region_passes() {
        let mask = left_half_mask(0.5);
        assert!(mask.accepts(&BoundingBox::new(10.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn box_outside_accepted_region_fails() {
        let mask = left_half_mask(0.5);
        assert!(!mask.accepts(&BoundingBox::new(60.0, 10.0, 20.0, 20.0)));
    }

    #[test]
    fn straddling_box_follows_threshold() {
        // Box spanning x in 40..60: exactly half its area is accepted.
        let bbox = BoundingBox::new(40.0, 10.0, 20.0, 20.0);
        assert!(left_half_mask(0.5).accepts(&bbox));
        assert!(!left_half_mask(0.6).accepts(&bbox));
    }

    #[test]
    fn box_entirely_outside_mask_bounds_is_rejected() {
        let mask = left_half_mask(0.01);
        assert!(!mask.accepts(&BoundingBox::new(200.0, 200.0, 20.0, 20.0)));
        assert!(!mask.accepts(&BoundingBox::new(-50.0, -50.0, 20.0, 20.0)));
    }

    #[test]
    fn bitmap_dimension_mismatch_is_an_error() {
        assert!(RegionMask::from_bitmap(vec![true; 10], 100, 100, 0.5).is_err());
    }

    #[test]
    fn threshold_out_of_range_is_an_error() {
        assert!(RegionMask::from_bitmap(vec![true; 4], 2, 2, 0.0).is_err());
        assert!(RegionMask::from_bitmap(vec![true; 4], 2, 2, 1.5).is_err());
    }

    #[test]
    fn filter_drops_rejected_detections() {
        use crate::detect::result::{Detection, DetectionLabel};

        let mask = left_half_mask(0.5);
        let dets = vec![
            Detection::new(BoundingBox::new(5.0, 5.0, 20.0, 20.0), 0.9, DetectionLabel::Cat),
            Detection::new(BoundingBox::new(70.0, 5.0, 20.0, 20.0), 0.9, DetectionLabel::Cat),
        ];
        let kept = mask.filter(dets);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].bbox.x, 5.0);
    }
}
