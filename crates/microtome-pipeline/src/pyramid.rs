//! Multi-resolution image pyramid access.
//!
//! The core never decodes slide files itself -- it reads rasters through
//! the [`ImagePyramid`] trait. Level 0 is full resolution; higher levels
//! are progressively downsampled. Concrete sources (slide decoders,
//! raster-backed pyramids, in-memory test fixtures) live outside this
//! crate.

use crate::types::{Dimensions, Point, RgbImage};

/// Errors surfaced by an image pyramid source.
#[derive(Debug, thiserror::Error)]
pub enum PyramidError {
    /// A requested level does not exist in the pyramid.
    #[error("level {level} out of range (pyramid has {count} levels)")]
    LevelOutOfRange {
        /// The requested level.
        level: usize,
        /// Number of levels the pyramid actually has.
        count: usize,
    },

    /// A requested region extends outside the pyramid bounds.
    #[error(
        "region at level-0 origin ({x}, {y}), level {level}, size {width}x{height} \
         is outside the pyramid bounds"
    )]
    RegionOutOfBounds {
        /// Level-0 x of the requested origin.
        x: i64,
        /// Level-0 y of the requested origin.
        y: i64,
        /// Level the region was requested at.
        level: usize,
        /// Requested width in level pixels.
        width: u32,
        /// Requested height in level pixels.
        height: u32,
    },

    /// The underlying source could not be read.
    #[error("failed to read pyramid source: {0}")]
    Read(String),
}

/// Read-only handle to a multi-resolution raster source.
///
/// Implementations must report a downsample factor of exactly 1.0 for
/// level 0 and monotonically non-decreasing factors for higher levels.
pub trait ImagePyramid {
    /// Number of resolution levels. Always at least 1.
    fn level_count(&self) -> usize;

    /// Pixel dimensions of the given level.
    ///
    /// # Errors
    ///
    /// Returns [`PyramidError::LevelOutOfRange`] for an invalid level.
    fn level_dimensions(&self, level: usize) -> Result<Dimensions, PyramidError>;

    /// Downsample factor of the given level relative to level 0 (>= 1).
    ///
    /// # Errors
    ///
    /// Returns [`PyramidError::LevelOutOfRange`] for an invalid level.
    fn level_downsample(&self, level: usize) -> Result<f64, PyramidError>;

    /// Read an RGB region.
    ///
    /// `origin` is expressed in level-0 coordinates regardless of
    /// `level`; `size` is in the target level's pixels.
    ///
    /// # Errors
    ///
    /// Returns [`PyramidError::LevelOutOfRange`] for an invalid level,
    /// [`PyramidError::RegionOutOfBounds`] if the region does not fit,
    /// or [`PyramidError::Read`] if the source fails.
    fn read_region(
        &self,
        origin: Point,
        level: usize,
        size: Dimensions,
    ) -> Result<RgbImage, PyramidError>;
}
