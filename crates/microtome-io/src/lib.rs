//! microtome-io: slide, annotation, and dataset I/O.
//!
//! Supplies the filesystem-facing collaborators around the sans-IO
//! pipeline crate: a raster-backed [`ImagePyramid`](microtome_pipeline::ImagePyramid)
//! source, an ASAP-style annotation XML parser, and JSON persistence
//! for sampled datasets.

pub mod annotations;
pub mod pyramid;
pub mod store;

pub use annotations::{AnnotationError, load_contours, parse_contours};
pub use pyramid::{OpenError, RasterPyramid};
pub use store::{StoreError, StoredDataset, read_dataset, write_dataset};
