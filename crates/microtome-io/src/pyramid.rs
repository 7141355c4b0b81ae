//! Raster-backed image pyramid.
//!
//! Stands in for a dedicated slide decoder: a standard raster image
//! (PNG, JPEG, BMP, TIFF) is decoded once and a factor-2 pyramid is
//! synthesized from it. Every level is held in memory, so this source
//! suits downsampled slide exports and test fixtures rather than raw
//! scanner files.

use std::path::Path;

use image::RgbImage;
use image::imageops::{self, FilterType};
use microtome_pipeline::pyramid::{ImagePyramid, PyramidError};
use microtome_pipeline::types::{Dimensions, Point};

/// Levels stop once the next halving would drop below this edge length.
const MIN_LEVEL_EDGE: u32 = 256;
/// Hard cap on synthesized levels.
const MAX_LEVELS: usize = 8;

/// Errors opening a raster-backed pyramid.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    /// The slide file could not be read.
    #[error("failed to read slide file: {0}")]
    Io(#[from] std::io::Error),

    /// The slide raster could not be decoded.
    #[error("failed to decode slide raster: {0}")]
    Decode(#[from] image::ImageError),
}

/// An in-memory pyramid synthesized from a single decoded raster.
pub struct RasterPyramid {
    levels: Vec<RgbImage>,
}

impl RasterPyramid {
    /// Decode a raster file and synthesize the pyramid.
    ///
    /// # Errors
    ///
    /// Returns [`OpenError::Io`] if the file cannot be read and
    /// [`OpenError::Decode`] if the raster format is unrecognized.
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        let bytes = std::fs::read(path)?;
        let full = image::load_from_memory(&bytes)?.to_rgb8();
        log::debug!(
            "opened {} ({}x{})",
            path.display(),
            full.width(),
            full.height(),
        );
        Ok(Self::from_image(full))
    }

    /// Build the pyramid from an already-decoded level-0 raster.
    #[must_use]
    pub fn from_image(full: RgbImage) -> Self {
        let mut levels = vec![full];
        while levels.len() < MAX_LEVELS {
            let prev = &levels[levels.len() - 1];
            let (width, height) = (prev.width() / 2, prev.height() / 2);
            if width.min(height) < MIN_LEVEL_EDGE {
                break;
            }
            let next = imageops::resize(prev, width, height, FilterType::Triangle);
            levels.push(next);
        }
        Self { levels }
    }

    fn level(&self, level: usize) -> Result<&RgbImage, PyramidError> {
        self.levels.get(level).ok_or(PyramidError::LevelOutOfRange {
            level,
            count: self.levels.len(),
        })
    }
}

impl ImagePyramid for RasterPyramid {
    fn level_count(&self) -> usize {
        self.levels.len()
    }

    fn level_dimensions(&self, level: usize) -> Result<Dimensions, PyramidError> {
        let image = self.level(level)?;
        Ok(Dimensions {
            width: image.width(),
            height: image.height(),
        })
    }

    fn level_downsample(&self, level: usize) -> Result<f64, PyramidError> {
        let image = self.level(level)?;
        Ok(f64::from(self.levels[0].width()) / f64::from(image.width()))
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn read_region(
        &self,
        origin: Point,
        level: usize,
        size: Dimensions,
    ) -> Result<RgbImage, PyramidError> {
        let downsample = self.level_downsample(level)?;
        let image = self.level(level)?;
        let out_of_bounds = PyramidError::RegionOutOfBounds {
            x: origin.x,
            y: origin.y,
            level,
            width: size.width,
            height: size.height,
        };
        if origin.x < 0 || origin.y < 0 {
            return Err(out_of_bounds);
        }
        // The origin arrives in level-0 coordinates.
        let x = (origin.x as f64 / downsample) as u32;
        let y = (origin.y as f64 / downsample) as u32;
        if x.checked_add(size.width).is_none_or(|end| end > image.width())
            || y.checked_add(size.height).is_none_or(|end| end > image.height())
        {
            return Err(out_of_bounds);
        }
        Ok(imageops::crop_imm(image, x, y, size.width, size.height).to_image())
    }
}
