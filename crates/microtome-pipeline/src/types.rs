//! Shared types for the microtome patch extraction pipeline.

use serde::{Deserialize, Serialize};

use crate::predicate::ContainmentRuleKind;
use crate::pyramid::PyramidError;

/// Re-export `RgbImage` so downstream crates can reference raster data
/// (the segmentation overlay, decoded slide regions) without depending
/// on `image` directly.
pub use image::RgbImage;

/// An integer 2D point in some pyramid level's pixel coordinate space.
///
/// Level-0 coordinates of gigapixel slides exceed `i32` comfortably in
/// intermediate arithmetic (areas, offsets), so `i64` throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: i64,
    /// Vertical position (pixels from top edge).
    pub y: i64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// This point translated by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i64, dy: i64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An ordered, closed polygon boundary as an integer point sequence.
///
/// The closing edge from the last point back to the first is implicit.
/// Contours are immutable once produced; the segmenter emits them in
/// level-0 coordinates regardless of the resolution level it ran at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contour(Vec<Point>);

impl Contour {
    /// Create a contour from a vector of vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the contour has no vertices.
    ///
    /// An empty contour is the whole-slide sentinel: the patch sampler
    /// treats it as "no constraint" and samples the full level-0 extent.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }
}

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// A retained tissue contour together with its retained holes, all in
/// level-0 coordinates.
///
/// Holes are a subset of the contour's direct children in the extracted
/// hierarchy: capped to the K largest by area, then area-filtered. A
/// hole never outlives its parent region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TissueRegion {
    /// Outer boundary of the region.
    pub contour: Contour,
    /// Background holes enclosed by `contour`.
    pub holes: Vec<Contour>,
}

/// A retained patch anchor with its disease label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    /// Top-left anchor of the patch in level-0 coordinates.
    pub coordinate: Point,
    /// 1 iff the patch overlaps a disease-region contour, else 0.
    pub label: u8,
}

/// Threshold selection policy for tissue segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdPolicy {
    /// Binarize the saturation channel at a fixed level: pixels strictly
    /// above the level are foreground.
    Fixed(u8),
    /// Compute a global threshold with Otsu's method.
    Otsu,
}

/// Configuration for the tissue segmenter.
///
/// Area thresholds are expressed in level-0 pixel units; the segmenter
/// divides them by the segmentation level's squared downsample factor
/// before comparing against contour areas measured at that level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Pyramid level the segmentation runs at. The full raster at this
    /// level must fit in memory.
    pub level: usize,

    /// Foreground threshold policy for the saturation channel.
    pub threshold: ThresholdPolicy,

    /// Minimum true area (outer area minus hole areas) of a tissue
    /// region, in level-0 pixels squared. Strictly smaller regions are
    /// discarded.
    pub min_tissue_area: f64,

    /// Minimum area of a retained hole, in level-0 pixels squared.
    pub min_hole_area: f64,

    /// At most this many holes are kept per tissue region (the largest
    /// by area), applied before the hole area filter.
    pub max_holes_per_tissue: usize,

    /// Median blur radius; the kernel is a square of side `2r + 1`.
    pub median_radius: u32,

    /// Morphological closing radius; the structuring element is a
    /// square of side `2r + 1`.
    pub close_radius: u8,
}

impl SegmentConfig {
    /// Default segmentation level (the original pipeline's level 6,
    /// roughly a 64x downsample on typical slide pyramids).
    pub const DEFAULT_LEVEL: usize = 6;
    /// Default fixed saturation threshold.
    pub const DEFAULT_THRESHOLD: u8 = 8;
    /// Default minimum tissue area: room for 100 patches of 512x512
    /// level-0 pixels.
    pub const DEFAULT_MIN_TISSUE_AREA: f64 = 26_214_400.0;
    /// Default minimum hole area: 16 patches of 512x512 level-0 pixels.
    pub const DEFAULT_MIN_HOLE_AREA: f64 = 4_194_304.0;
    /// Default hole cap per tissue region.
    pub const DEFAULT_MAX_HOLES: usize = 8;
    /// Default median blur radius (7x7 kernel).
    pub const DEFAULT_MEDIAN_RADIUS: u32 = 3;
    /// Default closing radius (5x5 structuring element).
    pub const DEFAULT_CLOSE_RADIUS: u8 = 2;

    /// Validate parameter domains.
    ///
    /// The segmentation level is validated against the pyramid by the
    /// segmenter itself, before any raster read.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if an area threshold is
    /// negative or not finite, or a kernel radius is zero.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if !self.min_tissue_area.is_finite() || self.min_tissue_area < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_tissue_area must be finite and non-negative, got {}",
                self.min_tissue_area,
            )));
        }
        if !self.min_hole_area.is_finite() || self.min_hole_area < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "min_hole_area must be finite and non-negative, got {}",
                self.min_hole_area,
            )));
        }
        if self.median_radius == 0 {
            return Err(PipelineError::InvalidConfig(
                "median_radius must be at least 1".to_owned(),
            ));
        }
        if self.close_radius == 0 {
            return Err(PipelineError::InvalidConfig(
                "close_radius must be at least 1".to_owned(),
            ));
        }
        Ok(())
    }
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            level: Self::DEFAULT_LEVEL,
            threshold: ThresholdPolicy::Fixed(Self::DEFAULT_THRESHOLD),
            min_tissue_area: Self::DEFAULT_MIN_TISSUE_AREA,
            min_hole_area: Self::DEFAULT_MIN_HOLE_AREA,
            max_holes_per_tissue: Self::DEFAULT_MAX_HOLES,
            median_radius: Self::DEFAULT_MEDIAN_RADIUS,
            close_radius: Self::DEFAULT_CLOSE_RADIUS,
        }
    }
}

/// Configuration for the patch sampler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleConfig {
    /// Pyramid level the patch size and step size are expressed at.
    /// Both are scaled to level-0 units by this level's downsample
    /// factor before any coordinate arithmetic.
    pub patch_level: usize,

    /// Patch size in patch-level pixels, (width, height).
    pub patch_size: (u32, u32),

    /// Grid stride in patch-level pixels, (width, height).
    pub step_size: (u32, u32),

    /// Which containment rule decides membership in the tissue contour.
    pub rule: ContainmentRuleKind,

    /// Fraction of the half patch size the four diagonal test points of
    /// the any-of-five / all-four rules are offset from the patch
    /// center. Must be in `[0, 1]`; 0 degrades both rules to a pure
    /// center test.
    pub corner_shift: f64,

    /// Worker count for the per-candidate filter pass, capped to the
    /// available hardware concurrency. 0 selects the strictly
    /// sequential path, which produces bit-identical results.
    pub workers: usize,
}

impl SampleConfig {
    /// Default patch level (full resolution).
    pub const DEFAULT_PATCH_LEVEL: usize = 0;
    /// Default patch edge in patch-level pixels.
    pub const DEFAULT_PATCH_EDGE: u32 = 256;
    /// Default corner shift fraction.
    pub const DEFAULT_CORNER_SHIFT: f64 = 0.5;
    /// Default worker count.
    pub const DEFAULT_WORKERS: usize = 10;

    /// Validate parameter domains, before any grid generation.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if a patch or step
    /// dimension is zero or the corner shift is outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.patch_size.0 == 0 || self.patch_size.1 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "patch_size must be non-zero, got {}x{}",
                self.patch_size.0, self.patch_size.1,
            )));
        }
        if self.step_size.0 == 0 || self.step_size.1 == 0 {
            return Err(PipelineError::InvalidConfig(format!(
                "step_size must be non-zero, got {}x{}",
                self.step_size.0, self.step_size.1,
            )));
        }
        if !(0.0..=1.0).contains(&self.corner_shift) {
            return Err(PipelineError::InvalidConfig(format!(
                "corner_shift must be in [0, 1], got {}",
                self.corner_shift,
            )));
        }
        Ok(())
    }
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            patch_level: Self::DEFAULT_PATCH_LEVEL,
            patch_size: (Self::DEFAULT_PATCH_EDGE, Self::DEFAULT_PATCH_EDGE),
            step_size: (Self::DEFAULT_PATCH_EDGE, Self::DEFAULT_PATCH_EDGE),
            rule: ContainmentRuleKind::default(),
            corner_shift: Self::DEFAULT_CORNER_SHIFT,
            workers: Self::DEFAULT_WORKERS,
        }
    }
}

/// Errors that can occur during segmentation or patch sampling.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The image pyramid source failed or was asked for an invalid
    /// level or region.
    #[error(transparent)]
    Pyramid(#[from] PyramidError),

    /// A configuration parameter is outside its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A contour has too few vertices to bound an area. Surfaced as a
    /// hard failure rather than silently dropping candidates.
    #[error("malformed contour with {points} vertices (need at least 3)")]
    MalformedContour {
        /// Vertex count of the offending contour.
        points: usize,
    },

    /// The rayon worker pool could not be constructed.
    #[error("failed to build worker pool: {0}")]
    WorkerPool(String),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_offset() {
        let p = Point::new(3, 4).offset(10, -2);
        assert_eq!(p, Point::new(13, 2));
    }

    #[test]
    fn contour_empty_is_whole_slide_sentinel() {
        let c = Contour::new(vec![]);
        assert!(c.is_empty());
        assert_eq!(c.len(), 0);
    }

    #[test]
    fn contour_accessors() {
        let pts = vec![Point::new(0, 0), Point::new(4, 0), Point::new(4, 4)];
        let c = Contour::new(pts.clone());
        assert_eq!(c.points(), &pts);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn segment_config_defaults_validate() {
        SegmentConfig::default().validate().unwrap();
    }

    #[test]
    fn segment_config_rejects_negative_area() {
        let config = SegmentConfig {
            min_tissue_area: -1.0,
            ..SegmentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn segment_config_rejects_zero_kernel() {
        let config = SegmentConfig {
            median_radius: 0,
            ..SegmentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sample_config_defaults_validate() {
        SampleConfig::default().validate().unwrap();
    }

    #[test]
    fn sample_config_rejects_zero_patch() {
        let config = SampleConfig {
            patch_size: (0, 256),
            ..SampleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn sample_config_rejects_out_of_range_shift() {
        let config = SampleConfig {
            corner_shift: 1.5,
            ..SampleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn config_serde_round_trip() {
        let config = SampleConfig {
            patch_level: 1,
            patch_size: (128, 128),
            step_size: (64, 64),
            rule: ContainmentRuleKind::AllFour,
            corner_shift: 0.25,
            workers: 4,
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: SampleConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, back);
    }

    #[test]
    fn error_display() {
        let err = PipelineError::MalformedContour { points: 2 };
        assert_eq!(
            err.to_string(),
            "malformed contour with 2 vertices (need at least 3)",
        );
    }
}
