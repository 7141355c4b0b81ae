//! Dataset persistence.
//!
//! A sampled dataset is written as a single JSON document holding the
//! sampling parameters alongside flat, index-aligned coordinate and
//! label arrays. Downstream training loaders only need the anchor list
//! and the patch geometry to cut the actual pixels out of the slide.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use microtome_pipeline::types::Point;
use microtome_pipeline::Dataset;
use serde::{Deserialize, Serialize};

/// Errors reading or writing a stored dataset.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The dataset file could not be read or written.
    #[error("dataset file error: {0}")]
    Io(#[from] std::io::Error),

    /// The dataset document is not valid JSON or does not match the
    /// stored schema.
    #[error("dataset serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// The coordinate and label arrays disagree in length.
    #[error("dataset arrays disagree in length: {coordinates} coordinates, {labels} labels")]
    LengthMismatch { coordinates: usize, labels: usize },
}

/// On-disk form of a sampled dataset.
///
/// `coordinates[i]` and `labels[i]` describe the same patch; the two
/// arrays are always the same length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredDataset {
    /// Pyramid level the patch geometry is expressed at.
    pub patch_level: usize,
    /// Patch width and height at `patch_level`.
    pub patch_size: (u32, u32),
    /// Level-0 top-left anchors, region by region in grid order.
    pub coordinates: Vec<Point>,
    /// Per-patch disease labels, aligned with `coordinates`.
    pub labels: Vec<u8>,
}

impl StoredDataset {
    /// Flatten a sampled dataset into its storable form.
    #[must_use]
    pub fn new(dataset: &Dataset, patch_level: usize, patch_size: (u32, u32)) -> Self {
        let (coordinates, labels) = dataset.flatten();
        Self {
            patch_level,
            patch_size,
            coordinates,
            labels,
        }
    }

    fn check_lengths(&self) -> Result<(), StoreError> {
        if self.coordinates.len() == self.labels.len() {
            Ok(())
        } else {
            Err(StoreError::LengthMismatch {
                coordinates: self.coordinates.len(),
                labels: self.labels.len(),
            })
        }
    }
}

/// Write a dataset document to `path` as JSON.
///
/// # Errors
///
/// Returns [`StoreError::LengthMismatch`] if the arrays are misaligned,
/// otherwise I/O and serialization errors.
pub fn write_dataset(path: &Path, dataset: &StoredDataset) -> Result<(), StoreError> {
    dataset.check_lengths()?;
    let file = File::create(path)?;
    serde_json::to_writer(BufWriter::new(file), dataset)?;
    log::debug!(
        "wrote {} patch record(s) to {}",
        dataset.coordinates.len(),
        path.display(),
    );
    Ok(())
}

/// Read a dataset document back from `path`.
///
/// # Errors
///
/// Returns I/O and deserialization errors, and
/// [`StoreError::LengthMismatch`] if the document's arrays are
/// misaligned.
pub fn read_dataset(path: &Path) -> Result<StoredDataset, StoreError> {
    let file = File::open(path)?;
    let dataset: StoredDataset = serde_json::from_reader(BufReader::new(file))?;
    dataset.check_lengths()?;
    Ok(dataset)
}
