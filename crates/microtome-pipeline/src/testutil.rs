//! In-memory pyramid fixture shared by the crate's tests.

#![allow(clippy::unwrap_used)]

use image::RgbImage;
use image::imageops::{self, FilterType};

use crate::pyramid::{ImagePyramid, PyramidError};
use crate::types::{Dimensions, Point};

/// A pyramid held entirely in memory, one decoded raster per level.
pub struct InMemoryPyramid {
    levels: Vec<RgbImage>,
}

impl InMemoryPyramid {
    /// A single-level pyramid (downsample 1).
    pub fn single_level(image: RgbImage) -> Self {
        Self {
            levels: vec![image],
        }
    }

    /// Build `count` levels by successive factor-2 nearest-neighbor
    /// halving of `full`.
    pub fn with_halved_levels(full: RgbImage, count: usize) -> Self {
        let mut levels = vec![full];
        while levels.len() < count {
            let prev = levels.last().unwrap();
            levels.push(imageops::resize(
                prev,
                (prev.width() / 2).max(1),
                (prev.height() / 2).max(1),
                FilterType::Nearest,
            ));
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

impl ImagePyramid for InMemoryPyramid {
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
        let x = (origin.x as f64 / downsample) as u32;
        let y = (origin.y as f64 / downsample) as u32;
        if x + size.width > image.width() || y + size.height > image.height() {
            return Err(out_of_bounds);
        }
        Ok(imageops::crop_imm(image, x, y, size.width, size.height).to_image())
    }
}
